//! Event sinks: where orchestrator events go.
//!
//! [`CollectingSink`] buffers every event for single-shot callers.
//! [`ChannelSink`] forwards each event into an `mpsc` channel drained by a
//! transport (a WebSocket writer, the terminal printer). Neither drops or
//! reorders events.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use super::events::{ChatResponse, StreamEvent};
use crate::error::{PilotError, Result};

/// Receives events in emission order.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event. An error means the consumer is gone; the
    /// orchestrator treats it as cancellation.
    async fn emit(&self, event: StreamEvent) -> Result<()>;
}

/// Buffers every event in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<StreamEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    pub async fn events(&self) -> Vec<StreamEvent> {
        self.events.lock().await.clone()
    }

    /// Aggregate built from the `complete` event, if one arrived.
    pub async fn response(&self) -> Option<ChatResponse> {
        self.events
            .lock()
            .await
            .iter()
            .rev()
            .find_map(|event| match event {
                StreamEvent::Complete {
                    message,
                    tool_calls,
                    conversation_id,
                    truncated,
                } => Some(ChatResponse {
                    message: message.clone(),
                    tool_calls: tool_calls.clone(),
                    conversation_id: conversation_id.clone(),
                    truncated: *truncated,
                }),
                _ => None,
            })
    }
}

#[async_trait]
impl EventSink for CollectingSink {
    async fn emit(&self, event: StreamEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

/// Forwards events into a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<StreamEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self { tx }
    }

    /// A sink and the receiver that drains it.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, event: StreamEvent) -> Result<()> {
        self.tx.send(event).await.map_err(|_| PilotError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(t: &str) -> StreamEvent {
        StreamEvent::Text {
            text: t.into(),
            conversation_id: "c1".into(),
        }
    }

    #[tokio::test]
    async fn test_collecting_sink_keeps_order() {
        let sink = CollectingSink::new();
        for t in ["a", "b", "c"] {
            sink.emit(text(t)).await.unwrap();
        }
        assert_eq!(sink.events().await, vec![text("a"), text("b"), text("c")]);
        assert!(sink.response().await.is_none());
    }

    #[tokio::test]
    async fn test_collecting_sink_response() {
        let sink = CollectingSink::new();
        sink.emit(text("hi")).await.unwrap();
        sink.emit(StreamEvent::Complete {
            message: "hi".into(),
            tool_calls: vec![],
            conversation_id: "c1".into(),
            truncated: false,
        })
        .await
        .unwrap();
        let response = sink.response().await.unwrap();
        assert_eq!(response.message, "hi");
        assert_eq!(response.conversation_id, "c1");
        assert!(response.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_in_order() {
        let (sink, mut rx) = ChannelSink::channel(8);
        sink.emit(text("1")).await.unwrap();
        sink.emit(text("2")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), text("1"));
        assert_eq!(rx.recv().await.unwrap(), text("2"));
    }

    #[tokio::test]
    async fn test_channel_sink_closed_is_cancelled() {
        let (sink, rx) = ChannelSink::channel(1);
        drop(rx);
        let err = sink.emit(text("x")).await.unwrap_err();
        assert!(matches!(err, PilotError::Cancelled));
    }
}
