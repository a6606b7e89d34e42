//! Providers module - generation backends
//!
//! A provider turns the conversation history and tool catalog into a stream
//! of [`GenFragment`]s.
//!
//! # Example
//!
//! ```no_run
//! use kubepilot::providers::{GeminiProvider, GenFragment, LLMProvider};
//! use kubepilot::session::Turn;
//!
//! # async fn example() -> kubepilot::error::Result<()> {
//! let provider = GeminiProvider::new("api-key", "gemini-flash-latest");
//! let mut stream = provider.generate(&[Turn::user("hello")], &[]).await?;
//! while let Some(fragment) = stream.recv().await {
//!     if let Ok(GenFragment::Text(text)) = fragment {
//!         print!("{}", text);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod gemini;
mod types;

use crate::error::ProviderError;

pub use gemini::GeminiProvider;
pub use types::{
    normalize_arguments, ChatOptions, FragmentStream, GenFragment, LLMProvider,
    FRAGMENT_CHANNEL_CAPACITY,
};

/// Map an HTTP status code and response body to a [`ProviderError`].
pub fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Auth(body.to_string()),
        404 => ProviderError::ModelNotFound(body.to_string()),
        429 => ProviderError::RateLimit(body.to_string()),
        400 => ProviderError::InvalidRequest(body.to_string()),
        408 | 504 => ProviderError::Timeout(body.to_string()),
        500..=599 => ProviderError::ServerError(body.to_string()),
        _ => ProviderError::Unknown(format!("HTTP {}: {}", status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_error_auth() {
        assert!(matches!(parse_provider_error(401, "x"), ProviderError::Auth(_)));
        assert!(matches!(parse_provider_error(403, "x"), ProviderError::Auth(_)));
    }

    #[test]
    fn test_parse_provider_error_client_errors() {
        assert!(matches!(
            parse_provider_error(404, "x"),
            ProviderError::ModelNotFound(_)
        ));
        assert!(matches!(
            parse_provider_error(429, "quota"),
            ProviderError::RateLimit(_)
        ));
        assert!(matches!(
            parse_provider_error(400, "x"),
            ProviderError::InvalidRequest(_)
        ));
    }

    #[test]
    fn test_parse_provider_error_server_errors() {
        assert!(matches!(
            parse_provider_error(500, "x"),
            ProviderError::ServerError(_)
        ));
        assert!(matches!(
            parse_provider_error(503, "x"),
            ProviderError::ServerError(_)
        ));
        assert!(matches!(parse_provider_error(504, "x"), ProviderError::Timeout(_)));
    }

    #[test]
    fn test_parse_provider_error_unknown() {
        let err = parse_provider_error(418, "teapot");
        assert!(matches!(err, ProviderError::Unknown(_)));
        assert!(err.to_string().contains("HTTP 418"));
    }
}
