//! Gateway module - HTTP and WebSocket transport
//!
//! Exposes an [`Orchestrator`] over axum:
//!
//! | Route | Purpose |
//! |---|---|
//! | `GET /` | service banner |
//! | `GET /api/health` | liveness and catalog size |
//! | `POST /api/chat/message` | single-shot chat, aggregated response |
//! | `GET /api/conversations/{id}` | stored history |
//! | `GET /ws/chat` | streaming chat over WebSocket |

mod handlers;
mod ws;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::agent::Orchestrator;
use crate::config::GatewayConfig;
use crate::error::Result;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

/// Build the router with CORS and request tracing applied.
pub fn create_router(state: AppState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/api/health", get(handlers::health))
        .route("/api/chat/message", post(handlers::chat_message))
        .route("/api/conversations/{id}", get(handlers::get_conversation))
        .route("/ws/chat", get(ws::chat_socket))
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS restricted to the configured origins; `*` allows any.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn run(orchestrator: Arc<Orchestrator>, config: &GatewayConfig) -> Result<()> {
    let app = create_router(AppState::new(orchestrator), config);
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;
    crate::log_component!(info, "gateway", "Gateway listening", addr = addr.to_string());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    crate::log_component!(info, "gateway", "Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
