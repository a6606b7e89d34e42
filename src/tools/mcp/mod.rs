//! MCP (Model Context Protocol) tool source.
//!
//! [`McpClient`] speaks JSON-RPC to one server. [`McpSession`] is the
//! connected state handed to the rest of the program: the catalog fetched at
//! startup and an executor for tool calls. Use [`with_session`] to run code
//! against a session; it closes the server session on every exit path,
//! including a failed handshake.

pub mod client;
pub mod executor;
pub mod protocol;

pub use client::McpClient;
pub use executor::McpToolExecutor;

use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::McpConfig;
use crate::error::Result;
use crate::tools::ToolCatalog;

/// A connected MCP server: its tool catalog and an executor for it.
#[derive(Clone)]
pub struct McpSession {
    pub catalog: ToolCatalog,
    pub executor: Arc<McpToolExecutor>,
}

impl McpSession {
    /// Handshake and fetch the catalog.
    async fn open(client: Arc<McpClient>) -> Result<Self> {
        client.initialize().await?;
        let tools = client.list_tools().await?;
        let catalog = ToolCatalog::new(tools.into_iter().map(|t| t.into_definition()).collect());
        info!(
            server = client.name(),
            tools = catalog.len(),
            "Connected to MCP server"
        );
        Ok(Self {
            catalog,
            executor: Arc::new(McpToolExecutor::new(client)),
        })
    }
}

/// Connect to the configured server, run `f` with the session, then close.
///
/// The server session is released whether `f` succeeds, fails, or the
/// handshake itself fails. Close failures are logged, not returned.
pub async fn with_session<F, Fut, T>(config: &McpConfig, f: F) -> Result<T>
where
    F: FnOnce(McpSession) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let client = Arc::new(McpClient::new(&config.name, &config.url, config.timeout_secs));

    let outcome = match McpSession::open(client.clone()).await {
        Ok(session) => f(session).await,
        Err(e) => Err(e),
    };

    if let Err(e) = client.close().await {
        warn!(server = client.name(), error = %e, "Failed to close MCP session");
    }
    outcome
}
