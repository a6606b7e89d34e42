//! Tools module - tool catalog and dispatch for LLM function calling
//!
//! # Overview
//!
//! - [`ToolDefinition`]: name, description and argument schema shown to the model
//! - [`ToolCatalog`]: immutable snapshot of the available tools, plus schema sanitization
//! - [`ToolExecutor`]: dispatches one named call; failures come back as `ToolError`
//! - [`ToolRegistry`]: executor for tools implemented in process
//! - [`mcp`]: executor and catalog source backed by an MCP server

mod catalog;
pub mod mcp;
mod registry;
mod types;

pub use catalog::{sanitize_schema, ToolCatalog, UNSUPPORTED_SCHEMA_KEYS};
pub use registry::{Tool, ToolRegistry};
pub use types::{ToolDefinition, ToolExecutor, ToolInvocation, ToolStatus};
