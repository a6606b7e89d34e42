//! Tool catalog
//!
//! The catalog is the immutable snapshot of callable tools fetched once at
//! startup. It also owns schema sanitization: the generation backend rejects
//! schema combinators and a few metadata keys, so those are stripped before
//! schemas are sent.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use super::ToolDefinition;

/// Schema keys the generation backend cannot parse, in either spelling.
pub const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &[
    "additionalProperties",
    "additional_properties",
    "anyOf",
    "any_of",
    "allOf",
    "all_of",
    "oneOf",
    "one_of",
    "$schema",
];

/// Immutable, cheaply clonable list of tool definitions.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Arc<[ToolDefinition]>,
}

impl ToolCatalog {
    /// Build a catalog snapshot. Duplicate names keep the first definition.
    pub fn new(definitions: Vec<ToolDefinition>) -> Self {
        let mut seen = HashSet::new();
        let tools: Vec<ToolDefinition> = definitions
            .into_iter()
            .filter(|def| {
                let fresh = seen.insert(def.name.clone());
                if !fresh {
                    warn!(tool = %def.name, "Duplicate tool name in catalog, keeping first");
                }
                fresh
            })
            .collect();
        Self {
            tools: tools.into(),
        }
    }

    /// All tool definitions, in discovery order.
    pub fn list(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Sanitize a schema for the generation backend. See [`sanitize_schema`].
    pub fn sanitize(&self, schema: &Value) -> Value {
        sanitize_schema(schema)
    }
}

/// Recursively drop [`UNSUPPORTED_SCHEMA_KEYS`] from a JSON schema.
///
/// Pure and deterministic. Everything else, including key order and
/// non-object values, is left as it was.
///
/// # Example
/// ```
/// use kubepilot::tools::sanitize_schema;
/// use serde_json::json;
///
/// let schema = json!({
///     "type": "object",
///     "additionalProperties": false,
///     "properties": {"n": {"anyOf": [{"type": "string"}], "type": "string"}}
/// });
/// assert_eq!(
///     sanitize_schema(&schema),
///     json!({"type": "object", "properties": {"n": {"type": "string"}}})
/// );
/// ```
pub fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .iter()
                .filter(|(k, _)| !UNSUPPORTED_SCHEMA_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), sanitize_schema(v)))
                .collect();
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_schema).collect()),
        other => other.clone(),
    }
}
