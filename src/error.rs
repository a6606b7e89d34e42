//! Error types for KubePilot
//!
//! Every fallible operation in the crate returns [`Result`]. Generation
//! backend failures carry a structured [`ProviderError`] so callers can
//! tell transient failures from permanent ones without string matching.
//! Tool failures use the separate [`ToolError`], which the orchestrator
//! absorbs into conversation state instead of propagating.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Provider Error Classification
// ============================================================================

/// Structured classification of generation backend failures.
#[derive(Debug)]
pub enum ProviderError {
    /// 401/403: Invalid API key or authentication failure
    Auth(String),
    /// 429: Rate limit or quota exceeded
    RateLimit(String),
    /// 500/502/503/504: Server-side errors
    ServerError(String),
    /// 400: Bad request, malformed parameters
    InvalidRequest(String),
    /// 404: Model not found or endpoint not available
    ModelNotFound(String),
    /// No fragment arrived within the configured window
    Timeout(String),
    /// The response stream broke after it started
    Stream(String),
    /// The backend sent something we could not interpret
    Format(String),
    /// Catch-all for unrecognized errors
    Unknown(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            ProviderError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            ProviderError::ServerError(msg) => write!(f, "Server error: {}", msg),
            ProviderError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ProviderError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
            ProviderError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ProviderError::Stream(msg) => write!(f, "Stream error: {}", msg),
            ProviderError::Format(msg) => write!(f, "Format error: {}", msg),
            ProviderError::Unknown(msg) => write!(f, "Unknown provider error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Returns `true` if this error is transient and the request could be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimit(_)
                | ProviderError::ServerError(_)
                | ProviderError::Timeout(_)
                | ProviderError::Stream(_)
        )
    }

    /// Returns the HTTP status code associated with this error, if applicable.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Auth(_) => Some(401),
            ProviderError::RateLimit(_) => Some(429),
            ProviderError::ServerError(_) => Some(500),
            ProviderError::InvalidRequest(_) => Some(400),
            ProviderError::ModelNotFound(_) => Some(404),
            ProviderError::Timeout(_)
            | ProviderError::Stream(_)
            | ProviderError::Format(_)
            | ProviderError::Unknown(_) => None,
        }
    }
}

impl From<ProviderError> for PilotError {
    fn from(err: ProviderError) -> Self {
        PilotError::Generation(err)
    }
}

// ============================================================================
// Tool Error
// ============================================================================

/// A single tool invocation failed.
///
/// Executors never panic or propagate across their boundary; every failure
/// is folded into this value and fed back to the model as text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ToolError {
    pub message: String,
}

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for KubePilot operations.
#[derive(Error, Debug)]
pub enum PilotError {
    /// Configuration-related errors (invalid config, missing API key, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected inbound request; raised before any state is touched
    #[error("Validation error: {0}")]
    Validation(String),

    /// The generation backend failed outright
    #[error("Generation error: {0}")]
    Generation(ProviderError),

    /// Tool plumbing errors outside a single invocation (catalog fetch, etc.)
    #[error("Tool error: {0}")]
    Tool(String),

    /// MCP (Model Context Protocol) errors (handshake, JSON-RPC failures)
    #[error("MCP error: {0}")]
    Mcp(String),

    /// Conversation bookkeeping errors
    #[error("Session error: {0}")]
    Session(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Resource not found (conversations, tools, etc.)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The run was cancelled by its owner
    #[error("Run cancelled")]
    Cancelled,
}

impl PilotError {
    /// Stable snake_case label for this error, used in logs and error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            PilotError::Config(_) => "config",
            PilotError::Validation(_) => "validation",
            PilotError::Generation(_) => "generation",
            PilotError::Tool(_) => "tool",
            PilotError::Mcp(_) => "mcp",
            PilotError::Session(_) => "session",
            PilotError::Io(_) => "io",
            PilotError::Json(_) => "json",
            PilotError::Http(_) => "http",
            PilotError::NotFound(_) => "not_found",
            PilotError::Cancelled => "cancelled",
        }
    }
}

/// A specialized `Result` type for KubePilot operations.
pub type Result<T> = std::result::Result<T, PilotError>;
