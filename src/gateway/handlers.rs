//! HTTP handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::AppState;
use crate::agent::{ChatRequest, ChatResponse, CollectingSink, StreamEvent};
use crate::error::PilotError;
use crate::session::Conversation;

pub(super) async fn root() -> Json<Value> {
    Json(json!({
        "message": "kubepilot API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub(super) async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "tools": state.orchestrator.catalog().len(),
    }))
}

/// Run one request to completion and return the aggregate.
pub(super) async fn chat_message(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let sink = CollectingSink::new();
    match state
        .orchestrator
        .process(request, &sink, &CancellationToken::new())
        .await
    {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            let conversation_id = sink.events().await.iter().rev().find_map(|event| match event {
                StreamEvent::Error {
                    conversation_id, ..
                } => conversation_id.clone(),
                _ => None,
            });
            Err(AppError::from_run(e, conversation_id))
        }
    }
}

pub(super) async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, AppError> {
    state
        .orchestrator
        .store()
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Conversation not found: {}", id)))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<String>,
}

#[derive(Debug)]
pub(super) enum AppError {
    BadRequest(String),
    NotFound(String),
    BadGateway {
        message: String,
        conversation_id: Option<String>,
    },
    Internal(String),
}

impl AppError {
    fn from_run(err: PilotError, conversation_id: Option<String>) -> Self {
        match err {
            PilotError::Validation(msg) => AppError::BadRequest(msg),
            PilotError::NotFound(msg) => AppError::NotFound(msg),
            e @ PilotError::Generation(_) => AppError::BadGateway {
                message: e.to_string(),
                conversation_id,
            },
            e => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, conversation_id) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::BadGateway {
                message,
                conversation_id,
            } => (StatusCode::BAD_GATEWAY, message, conversation_id),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
        };

        let body = Json(ErrorBody {
            error,
            conversation_id,
        });
        (status, body).into_response()
    }
}
