//! Provider types for KubePilot
//!
//! A provider turns `(history, tools)` into a stream of [`GenFragment`]s.
//! The stream is an `mpsc` receiver fed by a task the provider spawns, so
//! the caller consumes fragments as they arrive. The stream ends when the
//! sender is dropped; a mid-stream failure arrives as one `Err` item.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::error::{ProviderError, Result};
use crate::session::Turn;
use crate::tools::ToolDefinition;

/// One incremental unit of a generation response.
#[derive(Debug, Clone, PartialEq)]
pub enum GenFragment {
    /// A text delta
    Text(String),
    /// A complete tool-call request with normalized arguments
    ToolCall {
        name: String,
        arguments: Map<String, Value>,
        /// Opaque backend token that must be sent back with the request
        signature: Option<String>,
    },
}

impl GenFragment {
    pub fn text(text: impl Into<String>) -> Self {
        GenFragment::Text(text.into())
    }

    pub fn tool_call(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        GenFragment::ToolCall {
            name: name.into(),
            arguments,
            signature: None,
        }
    }

    /// Attach a backend signature to a tool-call fragment. Text is unchanged.
    pub fn with_signature(self, signature: Option<String>) -> Self {
        match self {
            GenFragment::ToolCall {
                name, arguments, ..
            } => GenFragment::ToolCall {
                name,
                arguments,
                signature,
            },
            text => text,
        }
    }
}

/// Receiving end of a generation stream.
pub type FragmentStream = mpsc::Receiver<std::result::Result<GenFragment, ProviderError>>;

/// Channel capacity used by providers for their fragment streams.
pub const FRAGMENT_CHANNEL_CAPACITY: usize = 32;

/// Trait for generation backends.
///
/// # Errors
///
/// `generate` fails with [`crate::error::PilotError::Generation`] when the
/// backend rejects the call outright (network, auth, quota). Fragments
/// already yielded before a later failure stand.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Start one generation call over the full history and tool catalog.
    async fn generate(&self, history: &[Turn], tools: &[ToolDefinition]) -> Result<FragmentStream>;

    /// Provider name (e.g. "gemini").
    fn name(&self) -> &str;

    /// Model identifier in use.
    fn model(&self) -> &str;
}

/// Sampling options applied to every generation call.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature for sampling
    pub temperature: Option<f32>,
}

impl ChatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Normalize raw tool-call arguments into a key/value mapping.
///
/// Backends deliver arguments as an object, as a JSON-encoded string, as
/// `null` when the tool takes none, or occasionally as a list of
/// `[key, value]` pairs. Anything else is a format error.
///
/// # Example
/// ```
/// use kubepilot::providers::normalize_arguments;
/// use serde_json::json;
///
/// let args = normalize_arguments(json!("{\"namespace\": \"default\"}")).unwrap();
/// assert_eq!(args["namespace"], "default");
/// assert!(normalize_arguments(json!(null)).unwrap().is_empty());
/// ```
pub fn normalize_arguments(raw: Value) -> std::result::Result<Map<String, Value>, ProviderError> {
    match raw {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        Value::String(s) if s.trim().is_empty() => Ok(Map::new()),
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(Value::Null) => Ok(Map::new()),
            Ok(other) => Err(ProviderError::Format(format!(
                "tool arguments decode to {} instead of an object",
                json_type(&other)
            ))),
            Err(e) => Err(ProviderError::Format(format!(
                "tool arguments are not valid JSON: {}",
                e
            ))),
        },
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Array(pair) if pair.len() == 2 => {
                    let mut pair = pair.into_iter();
                    match (pair.next(), pair.next()) {
                        (Some(Value::String(k)), Some(v)) => Ok((k, v)),
                        _ => Err(ProviderError::Format(
                            "tool argument pair must start with a string key".to_string(),
                        )),
                    }
                }
                other => Err(ProviderError::Format(format!(
                    "tool argument list item is {} instead of a [key, value] pair",
                    json_type(&other)
                ))),
            })
            .collect(),
        other => Err(ProviderError::Format(format!(
            "tool arguments are {} instead of an object",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
