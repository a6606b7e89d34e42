//! Agent module - orchestration of generation and tool rounds
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ ChatRequest │────>│ Orchestrator │────>│ LLMProvider │
//! │ (HTTP / WS) │     │              │     │  (Gemini)   │
//! └─────────────┘     └──────────────┘     └─────────────┘
//!                       │    │     │
//!                       │    │     ▼
//!                       │    │   ┌──────────────┐
//!                       │    │   │ ToolExecutor │
//!                       │    │   │    (MCP)     │
//!                       │    │   └──────────────┘
//!                       ▼    ▼
//!          ┌──────────────┐ ┌───────────┐
//!          │ Conversation │ │ EventSink │
//!          │    Store     │ │           │
//!          └──────────────┘ └───────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kubepilot::agent::{ChatRequest, CollectingSink, Orchestrator, OrchestratorSettings};
//! use kubepilot::session::ConversationStore;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn ask(provider: Arc<dyn LLMProvider>, session: McpSession) {
//!     let orchestrator = Orchestrator::new(
//!         OrchestratorSettings::default(),
//!         Arc::new(ConversationStore::new()),
//!         provider,
//!         session.catalog,
//!         session.executor,
//!     );
//!     let sink = CollectingSink::new();
//!     let response = orchestrator
//!         .process(ChatRequest::new("list pods"), &sink, &CancellationToken::new())
//!         .await
//!         .unwrap();
//!     println!("{}", response.message);
//! }
//! ```

mod context;
pub mod events;
mod r#loop;
pub mod sink;

pub use context::{SystemPrompt, DEFAULT_SYSTEM_PROMPT};
pub use events::{ChatRequest, ChatResponse, StreamEvent};
pub use r#loop::{Orchestrator, OrchestratorSettings, THINKING_MESSAGE};
pub use sink::{ChannelSink, CollectingSink, EventSink};
