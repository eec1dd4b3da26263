// Standalone MCP server binary

use anyhow::{Context, Result};
use clap::Parser;
use soilwms_core::{HttpTransport, SoilDataService, SoilWmsConfig, SystemClock};
use soilwms_mcp::server::McpServer;
use soilwms_mcp::tools::soil_registry;
use soilwms_mcp::transport::run_stdio;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "soilwms-mcp")]
#[command(about = "MCP server for the BGS soil data WMS", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "SOILWMS_CONFIG", default_value = "soilwms.toml")]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(args: &Args) {
    let default_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("soilwms_core={0},soilwms_mcp={0}", default_level).into()
    });

    // stdout carries the protocol, so logs go to stderr
    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    tracing::info!("Soil WMS MCP server starting...");

    let config = SoilWmsConfig::load(&args.config).context("Failed to load configuration")?;
    tracing::info!(
        base_url = %config.wms.base_url,
        version = %config.wms.version,
        cache_ttl_secs = config.cache.ttl_secs,
        "Configuration loaded"
    );

    let transport = Arc::new(HttpTransport::new(&config).context("Failed to create HTTP transport")?);
    let service = Arc::new(
        SoilDataService::new(config, transport, Arc::new(SystemClock))
            .context("Failed to create soil data service")?,
    );

    let registry = soil_registry(service);
    tracing::info!("Registered {} tools", registry.len());

    let server = McpServer::new(registry);
    run_stdio(&server).await?;

    Ok(())
}
