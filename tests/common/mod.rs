//! Shared mocks for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kubepilot::agent::{Orchestrator, OrchestratorSettings, StreamEvent};
use kubepilot::error::{ProviderError, ToolError};
use kubepilot::providers::{FragmentStream, GenFragment, LLMProvider, FRAGMENT_CHANNEL_CAPACITY};
use kubepilot::session::{ConversationStore, Turn};
use kubepilot::tools::{Tool, ToolDefinition, ToolExecutor, ToolRegistry};
use serde_json::{json, Map, Value};

// ============================================================================
// Scripted provider
// ============================================================================

/// One step of a scripted generation round.
#[derive(Debug, Clone)]
pub enum Frag {
    Text(&'static str),
    Call(&'static str, Value),
    /// Break the stream after the preceding fragments
    Break(&'static str),
}

/// One scripted generation round.
#[derive(Debug, Clone)]
pub enum Script {
    Round(Vec<Frag>),
    /// Reject the call before any fragment
    Reject(&'static str),
    /// Never send a fragment and keep the stream open
    Hang,
}

/// Plays back rounds in order, repeating the last one when exhausted, and
/// records the history each call saw.
pub struct ScriptedProvider {
    rounds: Vec<Script>,
    calls: AtomicUsize,
    delay: Duration,
    seen: Mutex<Vec<Vec<Turn>>>,
    tools_seen: Mutex<Vec<usize>>,
}

impl ScriptedProvider {
    pub fn new(rounds: Vec<Script>) -> Self {
        Self {
            rounds,
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
            tools_seen: Mutex::new(Vec::new()),
        }
    }

    /// A provider that always answers with the same text.
    pub fn text(text: &'static str) -> Self {
        Self::new(vec![Script::Round(vec![Frag::Text(text)])])
    }

    /// Wait this long before each fragment.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Histories seen by each generation call, in call order.
    pub fn histories(&self) -> Vec<Vec<Turn>> {
        self.seen.lock().unwrap().clone()
    }

    /// Catalog sizes seen by each generation call.
    pub fn tool_counts(&self) -> Vec<usize> {
        self.tools_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate(
        &self,
        history: &[Turn],
        tools: &[ToolDefinition],
    ) -> kubepilot::error::Result<FragmentStream> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(history.to_vec());
        self.tools_seen.lock().unwrap().push(tools.len());

        let script = self
            .rounds
            .get(index)
            .or_else(|| self.rounds.last())
            .cloned()
            .unwrap_or(Script::Round(Vec::new()));

        let frags = match script {
            Script::Reject(msg) => return Err(ProviderError::RateLimit(msg.to_string()).into()),
            Script::Hang => {
                let (tx, rx) = tokio::sync::mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    drop(tx);
                });
                return Ok(rx);
            }
            Script::Round(frags) => frags,
        };

        let (tx, rx) = tokio::sync::mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);
        let delay = self.delay;
        tokio::spawn(async move {
            for frag in frags {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let item = match frag {
                    Frag::Text(t) => Ok(GenFragment::text(t)),
                    Frag::Call(name, args) => Ok(GenFragment::tool_call(name, object(args))),
                    Frag::Break(msg) => Err(ProviderError::Stream(msg.to_string())),
                };
                let stop = item.is_err();
                if tx.send(item).await.is_err() || stop {
                    break;
                }
            }
        });
        Ok(rx)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

// ============================================================================
// In-process tools
// ============================================================================

/// Echoes `message`, optionally after `delay_ms`.
pub struct EchoTool {
    pub runs: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the message back"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {"type": "string"},
                "delay_ms": {"type": "integer"}
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        if let Some(ms) = arguments.get("delay_ms").and_then(Value::as_u64) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(arguments
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}

/// Always fails with a fixed message.
pub struct BrokenTool;

#[async_trait]
impl Tool for BrokenTool {
    fn name(&self) -> &str {
        "broken"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _arguments: &Map<String, Value>) -> Result<String, ToolError> {
        Err(ToolError::new("cluster unreachable"))
    }
}

/// A registry with `echo` and `broken`, plus the counter of echo runs.
pub fn registry() -> (ToolRegistry, Arc<AtomicUsize>) {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(EchoTool { runs: runs.clone() }));
    registry.register(Box::new(BrokenTool));
    (registry, runs)
}

// ============================================================================
// Wiring
// ============================================================================

pub fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        max_iterations: 10,
        parallel_tools: true,
        generation_timeout: Duration::from_secs(5),
        tool_timeout: Duration::from_secs(5),
    }
}

pub fn orchestrator(
    provider: Arc<ScriptedProvider>,
    executor: Arc<dyn ToolExecutor>,
    catalog_source: &ToolRegistry,
    settings: OrchestratorSettings,
) -> Orchestrator {
    Orchestrator::new(
        settings,
        Arc::new(ConversationStore::new()),
        provider,
        catalog_source.catalog(),
        executor,
    )
}

/// Orchestrator over the standard test registry.
pub fn standard(provider: Arc<ScriptedProvider>) -> (Orchestrator, Arc<AtomicUsize>) {
    let (registry, runs) = registry();
    let catalog = registry.catalog();
    let orch = Orchestrator::new(
        settings(),
        Arc::new(ConversationStore::new()),
        provider,
        catalog,
        Arc::new(registry),
    );
    (orch, runs)
}

pub fn kinds(events: &[StreamEvent]) -> Vec<&'static str> {
    events.iter().map(StreamEvent::kind).collect()
}
