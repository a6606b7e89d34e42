//! Orchestration loop
//!
//! One run takes a user message through as many generation/tool rounds as
//! the model needs, bounded by an iteration ceiling:
//!
//! 1. Validate the request and resolve the conversation.
//! 2. Hold the conversation's run lock for the whole run.
//! 3. Append the user turn, then alternate generation and tool rounds until
//!    a round produces no tool calls or the ceiling is reached.
//! 4. Emit `complete` (or `error`) to the sink.
//!
//! The history writes of a tool round (the model turn with the requests and
//! the tool-result turn) happen on a spawned task that also owns a share of
//! the run lock, so a run dropped mid-round still leaves every request
//! answered in the conversation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio::sync::{mpsc, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::events::{ChatRequest, ChatResponse, StreamEvent};
use super::sink::EventSink;
use crate::config::AgentConfig;
use crate::error::{PilotError, ProviderError, Result, ToolError};
use crate::providers::{GenFragment, LLMProvider};
use crate::session::{ConversationStore, Part, Turn};
use crate::tools::{ToolCatalog, ToolExecutor, ToolInvocation};

/// Payload of the `thinking` event.
pub const THINKING_MESSAGE: &str = "Processing...";

/// Tunables for a run, usually taken from [`AgentConfig`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Maximum generation rounds per run
    pub max_iterations: u32,
    /// Run the tool calls of one round concurrently
    pub parallel_tools: bool,
    /// Bound on the wait for each generation call and each fragment
    pub generation_timeout: Duration,
    /// Bound on each tool call
    pub tool_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

impl From<&AgentConfig> for OrchestratorSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            max_iterations: config.max_iterations.max(1),
            parallel_tools: config.parallel_tools,
            generation_timeout: Duration::from_secs(config.generation_timeout_secs.max(1)),
            tool_timeout: Duration::from_secs(config.tool_timeout_secs.max(1)),
        }
    }
}

/// Output of one generation round.
#[derive(Debug, Default)]
struct Round {
    text: String,
    calls: Vec<ToolInvocation>,
}

/// How the round loop ended.
enum Exit {
    /// A round produced no tool calls
    Finished(String),
    /// The iteration ceiling was hit with tool calls still coming
    Truncated(String),
}

/// Drives the generate/execute cycle for chat requests.
///
/// Cheap to share behind an `Arc`; every run borrows it immutably.
pub struct Orchestrator {
    settings: OrchestratorSettings,
    store: Arc<ConversationStore>,
    provider: Arc<dyn LLMProvider>,
    catalog: ToolCatalog,
    executor: Arc<dyn ToolExecutor>,
}

impl Orchestrator {
    pub fn new(
        settings: OrchestratorSettings,
        store: Arc<ConversationStore>,
        provider: Arc<dyn LLMProvider>,
        catalog: ToolCatalog,
        executor: Arc<dyn ToolExecutor>,
    ) -> Self {
        Self {
            settings,
            store,
            provider,
            catalog,
            executor,
        }
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Process one chat request, streaming events to `sink`.
    ///
    /// Every accepted run ends with exactly one `complete` or `error` event,
    /// unless `cancel` fires or the sink goes away first; after that no
    /// further events are emitted. Tool calls already started when that
    /// happens run to completion and their results are still recorded.
    ///
    /// # Errors
    ///
    /// - [`PilotError::Validation`] for an empty message, before any state
    ///   changes.
    /// - [`PilotError::Generation`] when a generation call fails or times
    ///   out.
    /// - [`PilotError::Cancelled`] when the run was abandoned.
    pub async fn process(
        &self,
        request: ChatRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse> {
        let message = request.message.trim();
        if message.is_empty() {
            let err = PilotError::Validation("Message is required".into());
            let _ = sink.emit(StreamEvent::error(err.to_string(), None)).await;
            return Err(err);
        }

        if cancel.is_cancelled() {
            return Err(PilotError::Cancelled);
        }

        let (conversation_id, _) = self
            .store
            .get_or_create(request.conversation_id.as_deref())
            .await;
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("run", run_id = %run_id, conversation_id = %conversation_id);

        async {
            let run_guard = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PilotError::Cancelled),
                guard = self.store.lock_run(&conversation_id) => Arc::new(guard?),
            };
            let start = Instant::now();

            let outcome = self
                .run(message, &conversation_id, sink, cancel, &run_guard)
                .await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match &outcome {
                Ok(response) => info!(
                    duration_ms,
                    tool_calls = response.tool_calls.len(),
                    truncated = response.truncated,
                    "Run complete"
                ),
                Err(PilotError::Cancelled) => info!(duration_ms, "Run cancelled"),
                Err(e) => {
                    error!(duration_ms, error = %e, "Run failed");
                    self.emit(
                        sink,
                        cancel,
                        StreamEvent::error(e.to_string(), Some(&conversation_id)),
                    )
                    .await
                    .ok();
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        message: &str,
        conversation_id: &str,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
        run_guard: &Arc<OwnedMutexGuard<()>>,
    ) -> Result<ChatResponse> {
        self.store.append(conversation_id, Turn::user(message)).await?;
        self.emit(
            sink,
            cancel,
            StreamEvent::Thinking {
                message: THINKING_MESSAGE.to_string(),
                conversation_id: conversation_id.to_string(),
            },
        )
        .await?;

        let max_iterations = self.settings.max_iterations;
        let mut iteration = 0;
        let mut tool_calls = Vec::new();

        let exit = loop {
            iteration += 1;
            debug!(iteration, max_iterations, "Generation round");

            let history = self.store.history(conversation_id).await?;
            let round = self.generate(&history, conversation_id, sink, cancel).await?;

            if round.calls.is_empty() {
                if !round.text.is_empty() {
                    self.store
                        .append(conversation_id, Turn::model_text(round.text.clone()))
                        .await?;
                }
                break Exit::Finished(round.text);
            }

            let (resolved, live) = self
                .execute(round.calls, conversation_id, sink, cancel, run_guard)
                .await?;
            tool_calls.extend(resolved);

            if !live {
                return Err(PilotError::Cancelled);
            }
            if iteration >= max_iterations {
                warn!(
                    iterations = iteration,
                    "Tool loop reached maximum iterations, returning partial response"
                );
                break Exit::Truncated(round.text);
            }
        };

        let (message, truncated) = match exit {
            Exit::Finished(text) => (text, false),
            Exit::Truncated(text) => (text, true),
        };
        let response = ChatResponse {
            message,
            tool_calls,
            conversation_id: conversation_id.to_string(),
            truncated,
        };
        self.emit(
            sink,
            cancel,
            StreamEvent::Complete {
                message: response.message.clone(),
                tool_calls: response.tool_calls.clone(),
                conversation_id: response.conversation_id.clone(),
                truncated,
            },
        )
        .await?;
        Ok(response)
    }

    /// One generation call: stream text out, collect tool-call requests.
    async fn generate(
        &self,
        history: &[Turn],
        conversation_id: &str,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<Round> {
        let limit = self.settings.generation_timeout;
        let timed_out = || ProviderError::Timeout(format!("no response within {}s", limit.as_secs()));

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PilotError::Cancelled),
            started = tokio::time::timeout(limit, self.provider.generate(history, self.catalog.list())) => {
                started.map_err(|_| timed_out())??
            }
        };

        let mut round = Round::default();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PilotError::Cancelled),
                next = tokio::time::timeout(limit, stream.recv()) => next.map_err(|_| timed_out())?,
            };
            match next {
                None => break,
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(GenFragment::Text(text))) => {
                    if text.is_empty() {
                        continue;
                    }
                    round.text.push_str(&text);
                    self.emit(
                        sink,
                        cancel,
                        StreamEvent::Text {
                            text,
                            conversation_id: conversation_id.to_string(),
                        },
                    )
                    .await?;
                }
                Some(Ok(GenFragment::ToolCall {
                    name,
                    arguments,
                    signature,
                })) => {
                    debug!(tool = %name, "Tool call requested");
                    round
                        .calls
                        .push(ToolInvocation::new(name, arguments).with_signature(signature));
                }
            }
        }
        Ok(round)
    }

    /// Resolve every call of one round.
    ///
    /// A call runs only after its `tool_call_start` was emitted; the rest
    /// resolve as failed without running. `tool_call_end` events follow
    /// request order even when calls finish out of order. The returned flag
    /// is false once the run was cancelled or the sink went away.
    async fn execute(
        &self,
        calls: Vec<ToolInvocation>,
        conversation_id: &str,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
        run_guard: &Arc<OwnedMutexGuard<()>>,
    ) -> Result<(Vec<ToolInvocation>, bool)> {
        let capacity = calls.len().max(1);
        let (go_tx, go_rx) = mpsc::channel(capacity);
        let (done_tx, mut done_rx) = mpsc::channel(capacity);
        let round = ToolRound {
            store: Arc::clone(&self.store),
            executor: Arc::clone(&self.executor),
            conversation_id: conversation_id.to_string(),
            parallel: self.settings.parallel_tools,
            tool_timeout: self.settings.tool_timeout,
            _run_guard: Arc::clone(run_guard),
        };
        let settle = tokio::spawn(
            round
                .settle(calls.clone(), go_rx, done_tx)
                .in_current_span(),
        );

        let mut live = true;
        if self.settings.parallel_tools {
            for call in &calls {
                live = self
                    .emit(sink, cancel, StreamEvent::tool_call_start(call, conversation_id))
                    .await
                    .is_ok();
                if !live || go_tx.send(()).await.is_err() {
                    break;
                }
            }
            drop(go_tx);
            while let Some(done) = done_rx.recv().await {
                live = live
                    && self
                        .emit(sink, cancel, StreamEvent::tool_call_end(&done, conversation_id))
                        .await
                        .is_ok();
            }
        } else {
            for call in &calls {
                live = self
                    .emit(sink, cancel, StreamEvent::tool_call_start(call, conversation_id))
                    .await
                    .is_ok();
                if !live || go_tx.send(()).await.is_err() {
                    break;
                }
                let Some(done) = done_rx.recv().await else {
                    break;
                };
                live = self
                    .emit(sink, cancel, StreamEvent::tool_call_end(&done, conversation_id))
                    .await
                    .is_ok();
                if !live {
                    break;
                }
            }
            drop(go_tx);
        }

        let resolved = settle
            .await
            .map_err(|e| PilotError::Session(format!("tool round failed: {}", e)))??;
        Ok((resolved, live))
    }

    /// Emit unless the run has been cancelled. A closed sink reads as
    /// cancellation.
    async fn emit(
        &self,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
        event: StreamEvent,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(PilotError::Cancelled);
        }
        sink.emit(event).await.map_err(|_| PilotError::Cancelled)
    }
}

/// History writes and tool execution of one round.
///
/// Runs detached from the orchestrating future. Each call waits for a go
/// signal, sent once its `tool_call_start` is out; a closed go channel
/// resolves the remaining calls as cancelled.
struct ToolRound {
    store: Arc<ConversationStore>,
    executor: Arc<dyn ToolExecutor>,
    conversation_id: String,
    parallel: bool,
    tool_timeout: Duration,
    _run_guard: Arc<OwnedMutexGuard<()>>,
}

impl ToolRound {
    async fn settle(
        self,
        calls: Vec<ToolInvocation>,
        mut go: mpsc::Receiver<()>,
        done: mpsc::Sender<ToolInvocation>,
    ) -> Result<Vec<ToolInvocation>> {
        let requests = calls
            .iter()
            .map(|c| Part::ToolCallRequest {
                name: c.name.clone(),
                arguments: c.arguments.clone(),
                signature: c.signature.clone(),
            })
            .collect();
        self.store
            .append(&self.conversation_id, Turn::model(requests))
            .await?;

        let mut resolved = Vec::with_capacity(calls.len());
        if self.parallel {
            let mut handles = Vec::with_capacity(calls.len());
            for call in &calls {
                handles.push(go.recv().await.map(|()| self.spawn(call)));
            }
            for (call, handle) in calls.into_iter().zip(handles) {
                let outcome = match handle {
                    Some(handle) => join_tool(handle).await,
                    None => Err(ToolError::new("run cancelled")),
                };
                let call = call.resolve(outcome);
                let _ = done.send(call.clone()).await;
                resolved.push(call);
            }
        } else {
            for call in calls {
                let outcome = match go.recv().await {
                    Some(()) => join_tool(self.spawn(&call)).await,
                    None => Err(ToolError::new("run cancelled")),
                };
                let call = call.resolve(outcome);
                let _ = done.send(call.clone()).await;
                resolved.push(call);
            }
        }

        let results = resolved
            .iter()
            .map(|c| Part::tool_call_result(c.name.clone(), c.result_text()))
            .collect();
        self.store
            .append(&self.conversation_id, Turn::tool_results(results))
            .await?;
        Ok(resolved)
    }

    /// Run one tool call on its own task, bounded by the tool timeout.
    fn spawn(&self, call: &ToolInvocation) -> JoinHandle<std::result::Result<String, ToolError>> {
        let executor = Arc::clone(&self.executor);
        let name = call.name.clone();
        let arguments = call.arguments.clone();
        let limit = self.tool_timeout;
        tokio::spawn(
            async move { run_tool(executor.as_ref(), &name, &arguments, limit).await }
                .in_current_span(),
        )
    }
}

async fn run_tool(
    executor: &dyn ToolExecutor,
    name: &str,
    arguments: &Map<String, Value>,
    limit: Duration,
) -> std::result::Result<String, ToolError> {
    let start = Instant::now();
    let outcome = match tokio::time::timeout(limit, executor.execute(name, arguments)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ToolError::new(format!(
            "tool call timed out after {}s",
            limit.as_secs()
        ))),
    };
    let latency_ms = start.elapsed().as_millis() as u64;
    match &outcome {
        Ok(_) => info!(tool = %name, latency_ms, "Tool executed successfully"),
        Err(e) => error!(tool = %name, latency_ms, error = %e, "Tool execution failed"),
    }
    outcome
}

async fn join_tool(
    handle: JoinHandle<std::result::Result<String, ToolError>>,
) -> std::result::Result<String, ToolError> {
    handle
        .await
        .unwrap_or_else(|e| Err(ToolError::new(format!("tool task failed: {}", e))))
}
