//! Wire types exchanged with clients.
//!
//! Outbound events serialize as `{"type": "...", "data": {...}}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tools::{ToolInvocation, ToolStatus};

/// Inbound chat request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// User message; must be non-empty
    #[serde(default)]
    pub message: String,
    /// Conversation to continue; absent starts a new one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: None,
        }
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }
}

/// Aggregate result of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Text of the final round
    pub message: String,
    /// Every tool invocation of the run, in request order
    pub tool_calls: Vec<ToolInvocation>,
    pub conversation_id: String,
    /// The iteration ceiling was hit before the model stopped calling tools
    #[serde(default)]
    pub truncated: bool,
}

/// Progress event emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    Thinking {
        message: String,
        conversation_id: String,
    },
    Text {
        text: String,
        conversation_id: String,
    },
    ToolCallStart {
        tool_name: String,
        arguments: Map<String, Value>,
        conversation_id: String,
    },
    ToolCallEnd {
        tool_name: String,
        arguments: Map<String, Value>,
        result: String,
        status: ToolStatus,
        conversation_id: String,
    },
    Complete {
        message: String,
        tool_calls: Vec<ToolInvocation>,
        conversation_id: String,
        truncated: bool,
    },
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
    },
}

impl StreamEvent {
    pub fn tool_call_start(invocation: &ToolInvocation, conversation_id: &str) -> Self {
        StreamEvent::ToolCallStart {
            tool_name: invocation.name.clone(),
            arguments: invocation.arguments.clone(),
            conversation_id: conversation_id.to_string(),
        }
    }

    pub fn tool_call_end(invocation: &ToolInvocation, conversation_id: &str) -> Self {
        StreamEvent::ToolCallEnd {
            tool_name: invocation.name.clone(),
            arguments: invocation.arguments.clone(),
            result: invocation.result_text().to_string(),
            status: invocation.status,
            conversation_id: conversation_id.to_string(),
        }
    }

    pub fn error(error: impl Into<String>, conversation_id: Option<&str>) -> Self {
        StreamEvent::Error {
            error: error.into(),
            conversation_id: conversation_id.map(str::to_string),
        }
    }

    /// The `type` tag this event serializes with.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Thinking { .. } => "thinking",
            StreamEvent::Text { .. } => "text",
            StreamEvent::ToolCallStart { .. } => "tool_call_start",
            StreamEvent::ToolCallEnd { .. } => "tool_call_end",
            StreamEvent::Complete { .. } => "complete",
            StreamEvent::Error { .. } => "error",
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            StreamEvent::Thinking {
                conversation_id, ..
            }
            | StreamEvent::Text {
                conversation_id, ..
            }
            | StreamEvent::ToolCallStart {
                conversation_id, ..
            }
            | StreamEvent::ToolCallEnd {
                conversation_id, ..
            }
            | StreamEvent::Complete {
                conversation_id, ..
            } => Some(conversation_id),
            StreamEvent::Error {
                conversation_id, ..
            } => conversation_id.as_deref(),
        }
    }

    /// `complete` and `error` end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::Complete { .. } | StreamEvent::Error { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_request_defaults() {
        let req: ChatRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.message, "");
        assert!(req.conversation_id.is_none());

        let req: ChatRequest =
            serde_json::from_str(r#"{"message":"hi","conversation_id":"c1"}"#).unwrap();
        assert_eq!(req, ChatRequest::new("hi").with_conversation("c1"));
    }

    #[test]
    fn test_text_event_wire_format() {
        let event = StreamEvent::Text {
            text: "Hello".into(),
            conversation_id: "c1".into(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "text", "data": {"text": "Hello", "conversation_id": "c1"}})
        );
        assert_eq!(event.kind(), "text");
    }

    #[test]
    fn test_tool_call_end_wire_format() {
        let mut args = Map::new();
        args.insert("namespace".into(), json!("default"));
        let inv = ToolInvocation::new("list_pods", args).resolve(Ok("pod-a Running".into()));
        let event = StreamEvent::tool_call_end(&inv, "c1");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "tool_call_end",
                "data": {
                    "tool_name": "list_pods",
                    "arguments": {"namespace": "default"},
                    "result": "pod-a Running",
                    "status": "completed",
                    "conversation_id": "c1"
                }
            })
        );
    }

    #[test]
    fn test_complete_event_round_trip() {
        let event = StreamEvent::Complete {
            message: "done".into(),
            tool_calls: vec![],
            conversation_id: "c1".into(),
            truncated: false,
        };
        let text = serde_json::to_string(&event).unwrap();
        let back: StreamEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back, event);
        assert!(back.is_terminal());
    }

    #[test]
    fn test_error_event_without_conversation() {
        let event = StreamEvent::error("Message is required", None);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "error", "data": {"error": "Message is required"}})
        );
        assert!(event.conversation_id().is_none());
        assert!(event.is_terminal());
    }
}
