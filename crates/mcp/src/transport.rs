// Newline-delimited JSON-RPC over async byte streams (stdio in production)

use crate::server::McpServer;
use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{info, warn};

use crate::protocol::{JsonRpcError, JsonRpcResponse};

/// Longest accepted message line
pub const MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

/// Serve requests from `reader` until EOF, writing one response line per request
pub async fn serve<R, W>(server: &McpServer, reader: R, writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_MESSAGE_BYTES));
    let mut sink = FramedWrite::new(writer, LinesCodec::new());

    while let Some(line) = lines.next().await {
        let response = match line {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                server.handle_message(line).await
            }
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!(max_bytes = MAX_MESSAGE_BYTES, "Message too long, discarding");
                Some(JsonRpcResponse::error(
                    serde_json::Value::Null,
                    JsonRpcError::parse_error("message exceeds maximum length"),
                ))
            }
            Err(LinesCodecError::Io(e)) => {
                return Err(e).context("Failed to read MCP message");
            }
        };

        if let Some(response) = response {
            let json = serde_json::to_string(&response).context("Failed to serialize MCP response")?;
            sink.send(json).await.context("Failed to write MCP response")?;
        }
    }

    info!("Input closed, shutting down");
    Ok(())
}

/// Serve over the process's stdin/stdout
pub async fn run_stdio(server: &McpServer) -> Result<()> {
    serve(server, tokio::io::stdin(), tokio::io::stdout()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::soil_registry;
    use crate::tools::testing::{service_with, FakeTransport, CAPABILITIES};

    async fn exchange(input: &str) -> Vec<serde_json::Value> {
        let server = McpServer::new(soil_registry(service_with(FakeTransport::returning(CAPABILITIES))));
        let mut output = Vec::new();
        serve(&server, input.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_session() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );

        let responses = exchange(input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["id"], 2);
        assert_eq!(responses[1]["result"]["tools"].as_array().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_malformed_line_does_not_end_session() {
        let input = concat!(
            "garbage\n",
            r#"{"jsonrpc":"2.0","id":9,"method":"ping"}"#,
            "\n",
        );

        let responses = exchange(input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["error"]["code"], -32700);
        assert_eq!(responses[1]["id"], 9);
    }

    #[tokio::test]
    async fn test_last_line_without_newline() {
        let responses = exchange(r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#).await;
        assert_eq!(responses.len(), 1);
    }
}
