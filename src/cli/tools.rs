//! Tools command handler: print the MCP server's catalog.

use anyhow::{Context, Result};
use kubepilot::config::Config;
use kubepilot::tools::mcp::with_session;

pub(crate) async fn cmd_tools(config: Config, json: bool) -> Result<()> {
    let catalog = with_session(&config.mcp, |session| async move { Ok(session.catalog) })
        .await
        .with_context(|| format!("Failed to list tools from {}", config.mcp.url))?;

    if json {
        println!("{}", serde_json::to_string_pretty(catalog.list())?);
        return Ok(());
    }

    println!("Tools from {} ({}):", config.mcp.url, catalog.len());
    let width = catalog.names().iter().map(|n| n.len()).max().unwrap_or(0);
    for tool in catalog.list() {
        let summary = tool.description.lines().next().unwrap_or_default();
        println!("  {:<width$}  {}", tool.name, summary, width = width);
    }
    Ok(())
}
