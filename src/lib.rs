//! KubePilot - chat with a Kubernetes cluster through MCP tools
//!
//! A user message goes to a generation backend together with the tool
//! catalog of an MCP server. Tool calls the model requests are executed and
//! fed back until the model answers in plain text or the iteration ceiling
//! is reached. Progress streams to the caller as [`agent::StreamEvent`]s.

pub mod agent;
pub mod config;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod session;
pub mod tools;
pub mod utils;

pub use agent::{ChatRequest, ChatResponse, Orchestrator, StreamEvent};
pub use config::Config;
pub use error::{PilotError, Result};
pub use providers::{GenFragment, LLMProvider};
pub use session::{ConversationStore, Turn};
pub use tools::{ToolDefinition, ToolExecutor};
