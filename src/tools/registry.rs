//! In-process tool registry
//!
//! [`ToolRegistry`] holds tools implemented in Rust and dispatches calls to
//! them by name. It implements [`ToolExecutor`], so it can stand in for the
//! MCP executor wherever tools live in the same process.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{ToolCatalog, ToolDefinition, ToolExecutor};
use crate::error::ToolError;

/// A tool implemented in process.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to request this tool.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the argument object.
    fn parameters(&self) -> Value;

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError>;
}

/// A registry that holds and dispatches in-process tools.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use kubepilot::error::ToolError;
/// use kubepilot::tools::{Tool, ToolExecutor, ToolRegistry};
/// use serde_json::{json, Map, Value};
///
/// struct Echo;
///
/// #[async_trait]
/// impl Tool for Echo {
///     fn name(&self) -> &str { "echo" }
///     fn description(&self) -> &str { "Echo the message" }
///     fn parameters(&self) -> Value { json!({"type": "object"}) }
///     async fn execute(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
///         Ok(args.get("message").and_then(Value::as_str).unwrap_or("").to_string())
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let mut registry = ToolRegistry::new();
/// registry.register(Box::new(Echo));
///
/// let mut args = Map::new();
/// args.insert("message".into(), json!("hello"));
/// assert_eq!(registry.execute("echo", &args).await.unwrap(), "hello");
/// # });
/// ```
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        info!(tool = %name, "Registering tool");
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions of all registered tools, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.parameters()))
            .collect()
    }

    /// A catalog snapshot of the registered tools.
    pub fn catalog(&self) -> ToolCatalog {
        ToolCatalog::new(self.definitions())
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<String, ToolError> {
        let Some(tool) = self.tools.get(name) else {
            return Err(ToolError::new(format!("Tool not found: {}", name)));
        };

        let start = Instant::now();
        let outcome = tool.execute(arguments).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => debug!(tool = name, duration_ms, "In-process tool finished"),
            Err(e) => debug!(tool = name, error = %e, duration_ms, "In-process tool failed"),
        }
        outcome
    }
}
