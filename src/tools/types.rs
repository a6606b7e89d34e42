//! Tool types for KubePilot
//!
//! Defines what the model sees about a tool ([`ToolDefinition`]), how one
//! requested call is tracked ([`ToolInvocation`]), and the seam through which
//! calls are dispatched ([`ToolExecutor`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ToolError;

/// Definition of a tool that the model may call.
///
/// # Example
/// ```
/// use kubepilot::tools::ToolDefinition;
/// use serde_json::json;
///
/// let def = ToolDefinition::new(
///     "list_pods",
///     "List pods in a namespace",
///     json!({
///         "type": "object",
///         "properties": {"namespace": {"type": "string"}},
///         "required": ["namespace"]
///     }),
/// );
/// assert_eq!(def.name, "list_pods");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique name within a catalog snapshot
    pub name: String,
    /// Human-readable description shown to the model
    pub description: String,
    /// JSON Schema of the argument object
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// Lifecycle state of a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Pending,
    Completed,
    Failed,
}

/// One requested tool call and, once resolved, its outcome.
///
/// Created pending for each tool-call request and resolved exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    #[serde(rename = "tool_name")]
    pub name: String,
    pub arguments: Map<String, Value>,
    pub status: ToolStatus,
    pub result: Option<String>,
    /// Backend signature of the request; never sent to clients
    #[serde(skip)]
    pub signature: Option<String>,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
            status: ToolStatus::Pending,
            result: None,
            signature: None,
        }
    }

    pub fn with_signature(mut self, signature: Option<String>) -> Self {
        self.signature = signature;
        self
    }

    /// Resolve a pending invocation with an executor outcome.
    ///
    /// Failures are recorded as `Error: <message>` so the text can be fed
    /// back to the model.
    pub fn resolve(self, outcome: Result<String, ToolError>) -> Self {
        let (status, result) = match outcome {
            Ok(text) => (ToolStatus::Completed, text),
            Err(e) => (ToolStatus::Failed, format!("Error: {}", e)),
        };
        Self {
            status,
            result: Some(result),
            ..self
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ToolStatus::Pending
    }

    /// Result text, empty while pending.
    pub fn result_text(&self) -> &str {
        self.result.as_deref().unwrap_or_default()
    }
}

/// Dispatches a named tool call.
///
/// Implementations must be safe to call concurrently for the calls of one
/// round, and must report every failure as `Err(ToolError)` rather than
/// panicking.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, name: &str, arguments: &Map<String, Value>)
        -> Result<String, ToolError>;
}

#[async_trait]
impl<T: ToolExecutor + ?Sized> ToolExecutor for std::sync::Arc<T> {
    async fn execute(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<String, ToolError> {
        (**self).execute(name, arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invocation_resolve_completed() {
        let inv = ToolInvocation::new("list_pods", Map::new());
        assert!(inv.is_pending());
        assert_eq!(inv.result_text(), "");

        let inv = inv.resolve(Ok("pod-a Running".into()));
        assert_eq!(inv.status, ToolStatus::Completed);
        assert_eq!(inv.result_text(), "pod-a Running");
    }

    #[test]
    fn test_invocation_resolve_failed() {
        let inv = ToolInvocation::new("delete_pod", Map::new()).resolve(Err(ToolError::new(
            "forbidden",
        )));
        assert_eq!(inv.status, ToolStatus::Failed);
        assert_eq!(inv.result_text(), "Error: forbidden");
    }

    #[test]
    fn test_invocation_serialization() {
        let mut args = Map::new();
        args.insert("namespace".into(), json!("default"));
        let inv = ToolInvocation::new("list_pods", args).resolve(Ok("ok".into()));
        assert_eq!(
            serde_json::to_value(&inv).unwrap(),
            json!({
                "tool_name": "list_pods",
                "arguments": {"namespace": "default"},
                "status": "completed",
                "result": "ok"
            })
        );
    }

    #[test]
    fn test_invocation_signature_stays_internal() {
        let inv = ToolInvocation::new("list_pods", Map::new())
            .with_signature(Some("sig-1".into()))
            .resolve(Ok("ok".into()));
        assert_eq!(inv.signature.as_deref(), Some("sig-1"));
        assert!(serde_json::to_value(&inv).unwrap().get("signature").is_none());
    }
}
