//! Stdio transport: newline-delimited JSON-RPC frames on stdin/stdout.
//!
//! Stdout carries protocol frames only; all diagnostics go to stderr via
//! tracing. Requests are processed in order, one at a time, so on shutdown
//! the in-flight call always drains before the stream closes.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::error::{Error, JsonRpcError, Result};
use crate::jsonrpc::JsonRpcService;
use crate::protocol::{JsonRpcMessage, JsonRpcNotification, JsonRpcResponse, McpNotification};
use crate::router::McpRouter;
use crate::transport::shutdown_signal;

pub struct StdioTransport {
    service: JsonRpcService<McpRouter>,
    router: McpRouter,
}

impl StdioTransport {
    pub fn new(router: McpRouter) -> Self {
        let service = JsonRpcService::new(router.clone());
        Self { service, router }
    }

    /// Run until EOF or a termination signal.
    pub async fn run(&mut self) -> Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        tracing::info!("Stdio transport started");

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            line.clear();
            let bytes_read = tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Termination signal received; closing stream");
                    break;
                }
                read = reader.read_line(&mut line) => {
                    read.map_err(|e| Error::Transport(format!("Failed to read stdin: {}", e)))?
                }
            };

            if bytes_read == 0 {
                tracing::info!("Stdin closed; shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(response) = self.process_line(trimmed).await {
                let frame = serde_json::to_string(&response)
                    .map_err(|e| Error::Transport(format!("Failed to serialize frame: {}", e)))?;
                stdout
                    .write_all(frame.as_bytes())
                    .await
                    .map_err(|e| Error::Transport(format!("Failed to write stdout: {}", e)))?;
                stdout
                    .write_all(b"\n")
                    .await
                    .map_err(|e| Error::Transport(format!("Failed to write newline: {}", e)))?;
                stdout
                    .flush()
                    .await
                    .map_err(|e| Error::Transport(format!("Failed to flush stdout: {}", e)))?;
            }
        }

        Ok(())
    }

    /// Handle one frame. Notifications produce no response.
    async fn process_line(&mut self, raw: &str) -> Option<crate::protocol::JsonRpcResponseMessage> {
        let parsed: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                return Some(single_error(JsonRpcError::parse_error(format!(
                    "Invalid JSON: {}",
                    e
                ))));
            }
        };

        // A frame without an id is a notification.
        if parsed.is_object() && parsed.get("id").is_none() {
            if let Ok(notification) = serde_json::from_value::<JsonRpcNotification>(parsed) {
                if let Ok(n) = McpNotification::from_jsonrpc(&notification) {
                    self.router.handle_notification(n);
                }
            }
            return None;
        }

        let message: JsonRpcMessage = match serde_json::from_value(parsed) {
            Ok(m) => m,
            Err(e) => {
                return Some(single_error(JsonRpcError::invalid_request(format!(
                    "Invalid request: {}",
                    e
                ))));
            }
        };

        match self.service.call_message(message).await {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::error!(error = %e, "Error processing frame");
                Some(single_error(JsonRpcError::internal_error(e.to_string())))
            }
        }
    }
}

fn single_error(error: JsonRpcError) -> crate::protocol::JsonRpcResponseMessage {
    crate::protocol::JsonRpcResponseMessage::Single(JsonRpcResponse::error(None, error))
}
