//! Tool executor backed by an MCP server.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use super::client::McpClient;
use crate::error::ToolError;
use crate::tools::ToolExecutor;

/// Dispatches tool calls to an MCP server through a shared [`McpClient`].
///
/// Transport timeouts come from the client; the orchestrator bounds each
/// call as a whole.
pub struct McpToolExecutor {
    client: Arc<McpClient>,
}

impl McpToolExecutor {
    pub fn new(client: Arc<McpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolExecutor for McpToolExecutor {
    async fn execute(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<String, ToolError> {
        let start = Instant::now();
        let call = self.client.call_tool(name, arguments).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = match call {
            Err(e) => {
                error!(tool = name, error = %e, duration_ms, "MCP tool call failed");
                return Err(ToolError::new(format!("Error calling tool: {}", e)));
            }
            Ok(result) => result,
        };

        let text = result.text();
        if result.is_error {
            info!(tool = name, duration_ms, "MCP tool reported an error");
            return Err(ToolError::new(if text.is_empty() {
                "MCP tool returned error".to_string()
            } else {
                text
            }));
        }

        debug!(tool = name, duration_ms, "MCP tool call finished");
        Ok(if text.is_empty() {
            "(no output)".to_string()
        } else {
            text
        })
    }
}
