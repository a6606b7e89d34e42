//! MCP client over the Streamable HTTP transport.
//!
//! Every JSON-RPC message is POSTed to a single endpoint. The server answers
//! either with a JSON body or with a short `text/event-stream` body whose
//! `data:` lines carry the response. The session id returned by
//! `initialize` (header `Mcp-Session-Id`) is echoed on every later request
//! and released with a `DELETE` on [`McpClient::close`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::protocol::{
    CallToolResult, JsonRpcRequest, JsonRpcResponse, ListToolsResult, McpTool, PROTOCOL_VERSION,
};
use crate::error::{PilotError, Result};

/// Session header defined by the Streamable HTTP transport.
pub const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Upper bound on `tools/list` pages, guarding against a cursor loop.
const MAX_LIST_PAGES: usize = 64;

/// JSON-RPC client for one MCP server.
pub struct McpClient {
    name: String,
    url: String,
    http: reqwest::Client,
    session_id: RwLock<Option<String>>,
    next_id: AtomicU64,
}

impl McpClient {
    /// Create a client. No traffic happens until [`McpClient::initialize`].
    pub fn new(name: &str, url: &str, timeout_secs: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .unwrap_or_default();
        Self {
            name: name.to_string(),
            url: url.to_string(),
            http,
            session_id: RwLock::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Session id assigned by the server, if any.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().ok().and_then(|s| s.clone())
    }

    /// Perform the `initialize` handshake and send `notifications/initialized`.
    pub async fn initialize(&self) -> Result<Value> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        });
        let result = self.request("initialize", Some(params)).await?;
        self.notify("notifications/initialized").await?;
        debug!(server = %self.name, session = ?self.session_id(), "MCP session initialized");
        Ok(result)
    }

    /// Fetch every tool the server advertises, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let value = self.request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(value)
                .map_err(|e| PilotError::Mcp(format!("invalid tools/list result: {}", e)))?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }

        warn!(server = %self.name, "tools/list pagination did not terminate");
        Ok(tools)
    }

    /// Invoke a tool.
    pub async fn call_tool(&self, name: &str, arguments: &Map<String, Value>) -> Result<CallToolResult> {
        let params = json!({ "name": name, "arguments": arguments });
        let value = self.request("tools/call", Some(params)).await?;
        serde_json::from_value(value)
            .map_err(|e| PilotError::Mcp(format!("invalid tools/call result: {}", e)))
    }

    /// Release the server-side session, if one was established.
    pub async fn close(&self) -> Result<()> {
        let Some(session) = self.session_id.write().ok().and_then(|mut s| s.take()) else {
            return Ok(());
        };
        let response = self
            .http
            .delete(&self.url)
            .header(SESSION_HEADER, &session)
            .send()
            .await?;
        // 405 means the server does not support explicit termination.
        if !response.status().is_success() && response.status().as_u16() != 405 {
            return Err(PilotError::Mcp(format!(
                "session close returned HTTP {}",
                response.status()
            )));
        }
        debug!(server = %self.name, "MCP session closed");
        Ok(())
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = JsonRpcRequest::new(id, method, params);
        let response = self.post(&body).await?;

        let status = response.status();
        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if let Ok(mut slot) = self.session_id.write() {
                *slot = Some(session.to_string());
            }
        }
        let is_sse = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        let text = response.text().await?;

        if !status.is_success() {
            return Err(PilotError::Mcp(format!(
                "{} returned HTTP {}: {}",
                method, status, text
            )));
        }

        let rpc = if is_sse {
            parse_sse_response(&text, id)?
        } else {
            serde_json::from_str::<JsonRpcResponse>(&text)
                .map_err(|e| PilotError::Mcp(format!("invalid {} response: {}", method, e)))?
        };

        if let Some(err) = rpc.error {
            return Err(PilotError::Mcp(format!(
                "{} failed ({}): {}",
                method, err.code, err.message
            )));
        }
        Ok(rpc.result.unwrap_or(Value::Null))
    }

    async fn notify(&self, method: &str) -> Result<()> {
        let response = self.post(&JsonRpcRequest::notification(method)).await?;
        if !response.status().is_success() {
            return Err(PilotError::Mcp(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }
        Ok(())
    }

    async fn post(&self, body: &JsonRpcRequest) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .post(&self.url)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(body);
        if let Some(session) = self.session_id() {
            request = request.header(SESSION_HEADER, session);
        }
        Ok(request.send().await?)
    }
}

/// Find the response with the given id among the `data:` lines of an
/// event-stream body. Server notifications interleaved in the stream are
/// skipped.
pub(crate) fn parse_sse_response(body: &str, id: u64) -> Result<JsonRpcResponse> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<JsonRpcResponse>(data.trim()).ok())
        .find(|rpc| rpc.id.as_ref().and_then(Value::as_u64) == Some(id))
        .ok_or_else(|| PilotError::Mcp(format!("no response with id {} in event stream", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sse_response_skips_notifications() {
        let body = concat!(
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\n\n",
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"id\":7,\"result\":{\"tools\":[]}}\n\n"
        );
        let rpc = parse_sse_response(body, 7).unwrap();
        assert_eq!(rpc.result.unwrap(), json!({"tools": []}));
    }

    #[test]
    fn test_parse_sse_response_missing_id() {
        let body = "data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n";
        assert!(parse_sse_response(body, 2).is_err());
    }

    #[test]
    fn test_new_client_has_no_session() {
        let client = McpClient::new("k8s", "http://127.0.0.1:1/mcp", 5);
        assert_eq!(client.name(), "k8s");
        assert_eq!(client.url(), "http://127.0.0.1:1/mcp");
        assert!(client.session_id().is_none());
    }

    #[tokio::test]
    async fn test_close_without_session_is_noop() {
        let client = McpClient::new("k8s", "http://127.0.0.1:1/mcp", 1);
        assert!(client.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_error() {
        let client = McpClient::new("k8s", "http://127.0.0.1:1/mcp", 1);
        assert!(client.initialize().await.is_err());
    }
}
