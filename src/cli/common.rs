//! Helpers shared by the CLI commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use kubepilot::agent::{Orchestrator, OrchestratorSettings, SystemPrompt};
use kubepilot::config::Config;
use kubepilot::error::PilotError;
use kubepilot::providers::{ChatOptions, GeminiProvider};
use kubepilot::session::ConversationStore;
use kubepilot::tools::mcp::McpSession;

/// Load config from `path`, or the default location.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Config::load().context("Failed to load config"),
    }
}

/// Wire a Gemini provider and a fresh conversation store to an MCP session.
pub(crate) fn build_orchestrator(
    config: &Config,
    session: &McpSession,
) -> kubepilot::error::Result<Orchestrator> {
    let api_key = config.gemini_api_key().ok_or_else(|| {
        PilotError::Config(
            "Gemini API key not set (providers.gemini.api_key or GOOGLE_API_KEY)".into(),
        )
    })?;

    let tool_names = session
        .catalog
        .names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let instruction = SystemPrompt::new()
        .with_tools(tool_names)
        .with_current_time()
        .build();
    let options = ChatOptions::new()
        .with_max_tokens(config.agent.max_tokens)
        .with_temperature(config.agent.temperature);

    let provider = GeminiProvider::new(&api_key, &config.agent.model)
        .with_api_base(&config.gemini_api_base())
        .with_system_instruction(instruction)
        .with_options(options);

    Ok(Orchestrator::new(
        OrchestratorSettings::from(&config.agent),
        Arc::new(ConversationStore::new()),
        Arc::new(provider),
        session.catalog.clone(),
        session.executor.clone(),
    ))
}

/// Shorten `text` to at most `max` characters for terminal display.
pub(crate) fn preview(text: &str, max: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max {
        return single_line;
    }
    let cut: String = single_line.chars().take(max).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_short_text_unchanged() {
        assert_eq!(preview("pod-a Running", 40), "pod-a Running");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("héllo wörld", 5), "héllo...");
        assert_eq!(preview("a\nb", 10), "a b");
    }

    #[test]
    fn test_load_config_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("none.json"))).unwrap();
        assert_eq!(config.agent.max_iterations, 10);
    }
}
