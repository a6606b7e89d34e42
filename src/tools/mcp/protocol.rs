//! MCP wire types: JSON-RPC 2.0 envelopes and the tool-related payloads.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::tools::ToolDefinition;

/// Protocol revision sent in `initialize`.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// JSON-RPC 2.0 request. A request without an id is a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            method: method.to_string(),
            params,
        }
    }

    pub fn notification(method: &str) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: method.to_string(),
            params: None,
        }
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A tool as advertised by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Option<Value>,
}

impl McpTool {
    /// Convert to a catalog definition, filling in a missing description
    /// or schema.
    pub fn into_definition(self) -> ToolDefinition {
        let description = self
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Execute {}", self.name));
        let parameters = self
            .input_schema
            .unwrap_or_else(|| json!({"type": "object", "properties": {}}));
        ToolDefinition {
            name: self.name,
            description,
            parameters,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<McpTool>,
    #[serde(rename = "nextCursor", default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// One content block of a `tools/call` result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    /// Images, audio, embedded resources; not forwarded to the model.
    #[serde(other)]
    Other,
}

impl ContentBlock {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// Text blocks joined with newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_has_no_id() {
        let n = serde_json::to_value(JsonRpcRequest::notification("notifications/initialized"))
            .unwrap();
        assert_eq!(
            n,
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"})
        );
    }

    #[test]
    fn test_mcp_tool_defaults() {
        let tool: McpTool = serde_json::from_value(json!({"name": "list_pods"})).unwrap();
        let def = tool.into_definition();
        assert_eq!(def.description, "Execute list_pods");
        assert_eq!(def.parameters, json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn test_mcp_tool_keeps_schema() {
        let tool: McpTool = serde_json::from_value(json!({
            "name": "get_logs",
            "description": "Fetch pod logs",
            "inputSchema": {"type": "object", "properties": {"pod": {"type": "string"}}}
        }))
        .unwrap();
        let def = tool.into_definition();
        assert_eq!(def.description, "Fetch pod logs");
        assert_eq!(def.parameters["properties"]["pod"]["type"], "string");
    }

    #[test]
    fn test_call_result_text_joins_text_blocks() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "pod-a Running"},
                {"type": "image", "data": "...", "mimeType": "image/png"},
                {"type": "text", "text": "pod-b Pending"}
            ]
        }))
        .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.text(), "pod-a Running\npod-b Pending");
    }
}
