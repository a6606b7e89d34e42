//! Logging initialization for KubePilot.
//!
//! Supports three formats:
//! - `pretty`: multi-line human-readable output
//! - `component`: compact single-line output; pair with [`log_component!`]
//!   to tag events with a `component` field
//! - `json`: structured JSON lines for log aggregators

use crate::config::{LogFormat, LoggingConfig};
use crate::error::Result;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber from config.
///
/// Call once at startup. `RUST_LOG` takes precedence over `cfg.level`.
/// Output goes to stderr, leaving stdout to the chat REPL, unless a JSON
/// log file is configured. Fails only when that file cannot be opened.
pub fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));

    match (cfg.format, &cfg.file) {
        (LogFormat::Json, Some(path)) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        (LogFormat::Json, None) => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        (LogFormat::Pretty, _) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .pretty()
                .init();
        }
        (LogFormat::Component, _) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .compact()
                .init();
        }
    }
    Ok(())
}

/// Emit a component-tagged tracing event.
///
/// ```
/// # use kubepilot::log_component;
/// log_component!(info, "gateway", "listening");
/// log_component!(warn, "mcp", "slow tool", tool = "list_pods", ms = 5200u64);
/// ```
#[macro_export]
macro_rules! log_component {
    ($level:ident, $component:expr, $msg:expr) => {
        tracing::$level!(component = $component, $msg)
    };
    ($level:ident, $component:expr, $msg:expr, $($key:ident = $val:expr),+ $(,)?) => {
        tracing::$level!(component = $component, $($key = $val,)+ $msg)
    };
}
