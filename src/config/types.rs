//! Configuration type definitions for KubePilot
//!
//! All types implement serde traits for JSON serialization and have sensible
//! defaults, so a partial (or missing) config file is always valid input.

use serde::{Deserialize, Serialize};

/// Main configuration struct for KubePilot
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Orchestration loop settings (model, iteration ceiling, timeouts)
    pub agent: AgentConfig,
    /// Generation backend configuration
    pub providers: ProvidersConfig,
    /// MCP tool server connection
    pub mcp: McpConfig,
    /// HTTP/WebSocket gateway configuration
    pub gateway: GatewayConfig,
    /// Logging output configuration
    pub logging: LoggingConfig,
}

// ============================================================================
// Agent Configuration
// ============================================================================

/// Default generation model.
pub const DEFAULT_MODEL: &str = "gemini-flash-latest";

/// Default ceiling on generation rounds per inbound message.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Orchestration loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model identifier passed to the generation backend
    pub model: String,
    /// Maximum tokens for responses
    pub max_tokens: u32,
    /// Temperature for generation
    pub temperature: f32,
    /// Maximum generation rounds per inbound message
    pub max_iterations: u32,
    /// Run the tool calls of one round concurrently
    pub parallel_tools: bool,
    /// Seconds to wait for the next generation fragment before failing
    pub generation_timeout_secs: u64,
    /// Seconds a single tool call may run before it is reported as failed
    pub tool_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 8192,
            temperature: 0.7,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            parallel_tools: true,
            generation_timeout_secs: 120,
            tool_timeout_secs: 60,
        }
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// All generation backend configurations
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Google Gemini configuration
    pub gemini: Option<ProviderConfig>,
}

/// Generic provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<String>,
    /// Custom API base URL
    #[serde(default)]
    pub api_base: Option<String>,
}

// ============================================================================
// MCP Configuration
// ============================================================================

/// MCP (Model Context Protocol) tool server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    /// Human-readable server name (shown in logs and the `tools` command).
    pub name: String,
    /// Streamable HTTP endpoint of the server.
    pub url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            name: "kubernetes".to_string(),
            url: "http://localhost:8000/mcp".to_string(),
            timeout_secs: 30,
        }
    }
}

// ============================================================================
// Gateway Configuration
// ============================================================================

/// Gateway server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Origins allowed by CORS. `"*"` allows any origin.
    pub allowed_origins: Vec<String>,
}

/// Default browser frontend origin.
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            allowed_origins: default_allowed_origins(DEFAULT_FRONTEND_URL),
        }
    }
}

/// Allowed origins for a given frontend URL plus the usual dev servers.
pub fn default_allowed_origins(frontend_url: &str) -> Vec<String> {
    let mut origins = vec![frontend_url.to_string()];
    for dev in ["http://localhost:3000", "http://localhost:5173"] {
        if !origins.iter().any(|o| o == dev) {
            origins.push(dev.to_string());
        }
    }
    origins
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable coloured output
    Pretty,
    /// Compact single-line output with component fields
    #[default]
    Component,
    /// Structured JSON lines
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Optional file to append logs to (JSON format only)
    pub file: Option<String>,
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            file: None,
            level: "info".to_string(),
        }
    }
}
