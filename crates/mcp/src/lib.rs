// MCP (Model Context Protocol) server exposing the BGS soil WMS as agent tools

pub mod protocol;
pub mod server;
pub mod tools;
pub mod transport;

pub use server::McpServer;
