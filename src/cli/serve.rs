//! Gateway command handler.

use std::sync::Arc;

use anyhow::{Context, Result};
use kubepilot::config::Config;
use kubepilot::gateway;
use kubepilot::tools::mcp::with_session;
use tracing::info;

use super::common::build_orchestrator;

/// Connect to the MCP server and serve until Ctrl-C.
pub(crate) async fn cmd_serve(config: Config) -> Result<()> {
    config.ensure_valid().context("Invalid configuration")?;
    info!(
        model = %config.agent.model,
        mcp = %config.mcp.url,
        max_iterations = config.agent.max_iterations,
        "Starting gateway"
    );

    let config = &config;
    with_session(&config.mcp, |session| async move {
        let orchestrator = Arc::new(build_orchestrator(config, &session)?);
        gateway::run(orchestrator, &config.gateway).await
    })
    .await
    .context("Gateway failed")
}
