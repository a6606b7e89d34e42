//! Configuration management for KubePilot
//!
//! Configuration is loaded from `~/.kubepilot/config.json` (or an explicit
//! path) and then overridden from the environment. A `.env` file in the
//! working directory is honoured. The resulting [`Config`] is passed by value
//! into the components that need it; there is no global instance.

mod types;
pub mod validate;

pub use types::*;

use crate::error::{PilotError, Result};
use std::path::{Path, PathBuf};

/// Default Gemini REST endpoint.
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

impl Config {
    /// Returns the KubePilot configuration directory path (~/.kubepilot)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".kubepilot")
    }

    /// Returns the path to the config file (~/.kubepilot/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    ///
    /// A missing file yields the defaults. A `.env` file, if present, is
    /// loaded into the process environment first.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment variable overrides from the process environment.
    ///
    /// Variables follow the pattern `KUBEPILOT_SECTION_KEY`. The variable
    /// names used by earlier deployments (`GOOGLE_API_KEY`, `GEMINI_MODEL`,
    /// `MCP_SERVER_URL`, `BACKEND_HOST`, `BACKEND_PORT`, `FRONTEND_URL`) are
    /// read as fallbacks.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|k| get(k));

        // Agent
        if let Some(val) = first(&["KUBEPILOT_AGENT_MODEL", "GEMINI_MODEL"]) {
            self.agent.model = val;
        }
        if let Some(v) = get("KUBEPILOT_AGENT_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            self.agent.max_tokens = v;
        }
        if let Some(v) = get("KUBEPILOT_AGENT_TEMPERATURE").and_then(|v| v.parse().ok()) {
            self.agent.temperature = v;
        }
        if let Some(v) = get("KUBEPILOT_AGENT_MAX_ITERATIONS").and_then(|v| v.parse().ok()) {
            self.agent.max_iterations = v;
        }
        if let Some(v) = get("KUBEPILOT_AGENT_PARALLEL_TOOLS").and_then(|v| v.parse().ok()) {
            self.agent.parallel_tools = v;
        }
        if let Some(v) =
            get("KUBEPILOT_AGENT_GENERATION_TIMEOUT_SECS").and_then(|v| v.parse().ok())
        {
            self.agent.generation_timeout_secs = v;
        }
        if let Some(v) = get("KUBEPILOT_AGENT_TOOL_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.agent.tool_timeout_secs = v;
        }

        // Gemini
        if let Some(val) = first(&["KUBEPILOT_PROVIDERS_GEMINI_API_KEY", "GOOGLE_API_KEY"]) {
            let provider = self
                .providers
                .gemini
                .get_or_insert_with(ProviderConfig::default);
            provider.api_key = Some(val);
        }
        if let Some(val) = get("KUBEPILOT_PROVIDERS_GEMINI_API_BASE") {
            let provider = self
                .providers
                .gemini
                .get_or_insert_with(ProviderConfig::default);
            provider.api_base = Some(val);
        }

        // MCP
        if let Some(val) = first(&["KUBEPILOT_MCP_URL", "MCP_SERVER_URL"]) {
            self.mcp.url = val;
        }
        if let Some(v) = get("KUBEPILOT_MCP_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.mcp.timeout_secs = v;
        }

        // Gateway
        if let Some(val) = first(&["KUBEPILOT_GATEWAY_HOST", "BACKEND_HOST"]) {
            self.gateway.host = val;
        }
        if let Some(v) = first(&["KUBEPILOT_GATEWAY_PORT", "BACKEND_PORT"]).and_then(|v| v.parse().ok())
        {
            self.gateway.port = v;
        }
        if let Some(val) = get("FRONTEND_URL") {
            self.gateway.allowed_origins = default_allowed_origins(&val);
        }

        // Logging
        if let Some(val) = get("KUBEPILOT_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = get("KUBEPILOT_LOG_FORMAT") {
            if let Ok(format) = serde_json::from_value(serde_json::Value::String(val)) {
                self.logging.format = format;
            }
        }
    }

    /// Gemini API key, if one is configured and non-empty.
    pub fn gemini_api_key(&self) -> Option<String> {
        self.providers
            .gemini
            .as_ref()
            .and_then(|p| p.api_key.clone())
            .filter(|k| !k.trim().is_empty())
    }

    /// Gemini API base URL, falling back to the public endpoint.
    pub fn gemini_api_base(&self) -> String {
        self.providers
            .gemini
            .as_ref()
            .and_then(|p| p.api_base.clone())
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string())
    }

    /// Returns problems that make this configuration unusable for serving.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.agent.model.trim().is_empty() {
            problems.push("agent.model must not be empty".to_string());
        }
        if self.agent.max_iterations == 0 {
            problems.push("agent.max_iterations must be at least 1".to_string());
        }
        if self.agent.generation_timeout_secs == 0 {
            problems.push("agent.generation_timeout_secs must be at least 1".to_string());
        }
        if self.agent.tool_timeout_secs == 0 {
            problems.push("agent.tool_timeout_secs must be at least 1".to_string());
        }
        if self.mcp.url.trim().is_empty() {
            problems.push("mcp.url must not be empty".to_string());
        }
        if self.gateway.port == 0 {
            problems.push("gateway.port must not be 0".to_string());
        }
        problems
    }

    /// Like [`Config::validate`], but folds the problems into one error.
    pub fn ensure_valid(&self) -> Result<()> {
        let problems = self.validate();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(PilotError::Config(problems.join("; ")))
        }
    }

    /// A copy of this configuration safe to print: secrets are masked.
    pub fn redacted(&self) -> Config {
        let mut copy = self.clone();
        if let Some(gemini) = copy.providers.gemini.as_mut() {
            if let Some(key) = gemini.api_key.as_mut() {
                *key = mask_secret(key);
            }
        }
        copy
    }
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = Config::default();
        config.apply_overrides_from(|k| env.get(k).cloned());
        config
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.agent.model, "gemini-flash-latest");
        assert_eq!(config.agent.max_iterations, 10);
        assert!(config.agent.parallel_tools);
        assert_eq!(config.gateway.host, "0.0.0.0");
        assert_eq!(config.gateway.port, 8001);
        assert_eq!(
            config.gateway.allowed_origins,
            vec!["http://localhost:5173", "http://localhost:3000"]
        );
        assert!(config.gemini_api_key().is_none());
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{"agent": {"max_iterations": 3}, "gateway": {"port": 9000}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.agent.max_iterations, 3);
        assert_eq!(config.agent.model, DEFAULT_MODEL);
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.host, "0.0.0.0");
    }

    #[test]
    fn test_env_override_native_names() {
        let config = overrides(&[
            ("KUBEPILOT_AGENT_MODEL", "gemini-pro"),
            ("KUBEPILOT_AGENT_MAX_ITERATIONS", "4"),
            ("KUBEPILOT_AGENT_PARALLEL_TOOLS", "false"),
            ("KUBEPILOT_GATEWAY_PORT", "9100"),
            ("KUBEPILOT_PROVIDERS_GEMINI_API_KEY", "native-key"),
            ("KUBEPILOT_LOG_FORMAT", "json"),
        ]);
        assert_eq!(config.agent.model, "gemini-pro");
        assert_eq!(config.agent.max_iterations, 4);
        assert!(!config.agent.parallel_tools);
        assert_eq!(config.gateway.port, 9100);
        assert_eq!(config.gemini_api_key().as_deref(), Some("native-key"));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_env_override_legacy_names() {
        let config = overrides(&[
            ("GOOGLE_API_KEY", "legacy-key"),
            ("GEMINI_MODEL", "gemini-legacy"),
            ("MCP_SERVER_URL", "http://mcp:9000/mcp"),
            ("BACKEND_PORT", "8111"),
            ("FRONTEND_URL", "https://ui.example.com"),
        ]);
        assert_eq!(config.gemini_api_key().as_deref(), Some("legacy-key"));
        assert_eq!(config.agent.model, "gemini-legacy");
        assert_eq!(config.mcp.url, "http://mcp:9000/mcp");
        assert_eq!(config.gateway.port, 8111);
        assert_eq!(
            config.gateway.allowed_origins,
            vec![
                "https://ui.example.com",
                "http://localhost:3000",
                "http://localhost:5173"
            ]
        );
    }

    #[test]
    fn test_native_name_wins_over_legacy() {
        let config = overrides(&[
            ("KUBEPILOT_PROVIDERS_GEMINI_API_KEY", "native"),
            ("GOOGLE_API_KEY", "legacy"),
        ]);
        assert_eq!(config.gemini_api_key().as_deref(), Some("native"));
    }

    #[test]
    fn test_unparseable_override_is_ignored() {
        let config = overrides(&[("KUBEPILOT_AGENT_MAX_ITERATIONS", "many")]);
        assert_eq!(config.agent.max_iterations, DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_empty());

        let mut config = Config::default();
        config.agent.max_iterations = 0;
        config.mcp.url = " ".to_string();
        let problems = config.validate();
        assert_eq!(problems.len(), 2);
        assert!(config.ensure_valid().is_err());
    }

    #[test]
    fn test_redacted_masks_api_key() {
        let mut config = Config::default();
        config.providers.gemini = Some(ProviderConfig {
            api_key: Some("AIzaSyExampleKey123".to_string()),
            api_base: None,
        });
        let redacted = config.redacted();
        let key = redacted.gemini_api_key().unwrap();
        assert_eq!(key, "AIza****");
        assert_eq!(config.gemini_api_key().unwrap(), "AIzaSyExampleKey123");
    }

    #[test]
    fn test_gemini_api_base_default() {
        let config = Config::default();
        assert_eq!(config.gemini_api_base(), DEFAULT_GEMINI_API_BASE);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.agent.max_iterations = 7;
        config.mcp.name = "k8s".to_string();
        config.save_to_path(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Config = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.agent.max_iterations, 7);
        assert_eq!(loaded.mcp.name, "k8s");
    }

    #[test]
    fn test_config_path() {
        let path = Config::path();
        assert!(path.ends_with(".kubepilot/config.json"));
    }
}
