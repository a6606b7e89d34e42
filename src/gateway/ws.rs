//! Streaming chat over WebSocket.
//!
//! Each inbound text frame is a [`ChatRequest`]; each outbound event is one
//! JSON text frame. A connection runs three pieces: the reader below, a
//! worker that processes requests one at a time in arrival order, and a
//! writer that drains the event channel into the socket. Closing the socket
//! cancels the run in flight.
//!
//! Frames that fail to parse queue up like requests, so their `error` event
//! never lands inside another run's event stream.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::AppState;
use crate::agent::{ChannelSink, ChatRequest, EventSink, StreamEvent};
use crate::error::PilotError;

/// Outbound events buffered per connection.
const EVENT_BUFFER: usize = 64;
/// Requests queued behind the one in flight.
const REQUEST_QUEUE: usize = 16;

/// One parsed inbound frame.
enum Inbound {
    Chat(ChatRequest),
    Invalid(String),
}

pub(super) async fn chat_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = uuid::Uuid::new_v4().to_string();
    info!(connection_id = %connection_id, "WebSocket connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (sink, mut events) = ChannelSink::channel(EVENT_BUFFER);
    let cancel = CancellationToken::new();

    let writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "Failed to encode event");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let (requests, mut queue) = mpsc::channel::<Inbound>(REQUEST_QUEUE);
    let worker = {
        let sink = sink.clone();
        let cancel = cancel.clone();
        let orchestrator = state.orchestrator.clone();
        tokio::spawn(async move {
            while let Some(inbound) = queue.recv().await {
                let request = match inbound {
                    Inbound::Chat(request) => request,
                    Inbound::Invalid(reason) => {
                        if sink.emit(StreamEvent::error(reason, None)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };
                match orchestrator.process(request, &sink, &cancel).await {
                    Ok(_) => {}
                    Err(PilotError::Cancelled) => break,
                    Err(e) => debug!(error = %e, "Request ended with error"),
                }
            }
        })
    };

    while let Some(frame) = ws_rx.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, "WebSocket receive error");
                break;
            }
        };

        let inbound = match serde_json::from_str::<ChatRequest>(text.as_str()) {
            Ok(request) => Inbound::Chat(request),
            Err(e) => Inbound::Invalid(format!("Invalid JSON: {}", e)),
        };
        if requests.send(inbound).await.is_err() {
            break;
        }
    }

    cancel.cancel();
    drop(requests);
    drop(sink);
    if let Err(e) = worker.await {
        warn!(error = %e, "WebSocket worker failed");
    }
    writer.abort();
    info!(connection_id = %connection_id, "WebSocket disconnected");
}
