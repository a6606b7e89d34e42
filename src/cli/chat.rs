//! Terminal chat command handler.

use std::future::Future;
use std::io::Write;

use anyhow::{Context, Result};
use kubepilot::agent::{ChannelSink, ChatRequest, Orchestrator, StreamEvent};
use kubepilot::config::Config;
use kubepilot::error::PilotError;
use kubepilot::tools::mcp::with_session;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio_util::sync::CancellationToken;

use super::common::{build_orchestrator, preview};

const RESULT_PREVIEW_CHARS: usize = 120;

/// Chat with the cluster from the terminal.
///
/// With `message`, runs one turn and exits; otherwise reads lines until
/// `quit`, `exit`, Ctrl-C at the prompt, or end of input.
pub(crate) async fn cmd_chat(config: Config, message: Option<String>) -> Result<()> {
    config.ensure_valid().context("Invalid configuration")?;

    let config = &config;
    with_session(&config.mcp, |session| async move {
        let orchestrator = build_orchestrator(config, &session)?;
        let mut conversation_id = None;

        if let Some(message) = message {
            return run_turn(&orchestrator, message, &mut conversation_id).await;
        }

        println!(
            "kubepilot chat ({} tools). Type 'quit' or 'exit' to leave.",
            session.catalog.len()
        );
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("\n> ");
            std::io::stdout().flush()?;

            let line = match next_input(&mut lines, interrupted()).await? {
                Input::Message(line) => line,
                Input::Quit => break,
            };
            if let Err(e) = run_turn(&orchestrator, line, &mut conversation_id).await {
                tracing::debug!(error = %e, "Turn ended with error");
            }
        }
        Ok(())
    })
    .await
    .context("Chat failed")
}

/// What the prompt produced.
#[derive(Debug, PartialEq)]
enum Input {
    Message(String),
    Quit,
}

/// Wait for the next non-blank line. End of input, `quit`, `exit`, and
/// `interrupt` resolving all read as [`Input::Quit`].
async fn next_input<R, F>(lines: &mut Lines<R>, interrupt: F) -> std::io::Result<Input>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(interrupt);
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut interrupt => return Ok(Input::Quit),
        };
        let Some(line) = line else {
            return Ok(Input::Quit);
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line.to_lowercase().as_str(), "quit" | "exit") {
            return Ok(Input::Quit);
        }
        return Ok(Input::Message(line.to_string()));
    }
}

/// Resolves on Ctrl-C; never resolves if the handler can't be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Run one message, printing events as they arrive. Ctrl-C cancels the turn.
async fn run_turn(
    orchestrator: &Orchestrator,
    message: String,
    conversation_id: &mut Option<String>,
) -> kubepilot::error::Result<()> {
    let (sink, mut events) = ChannelSink::channel(64);
    let printer = tokio::spawn(async move {
        let mut seen_id = None;
        while let Some(event) = events.recv().await {
            if let Some(id) = event.conversation_id() {
                seen_id = Some(id.to_string());
            }
            print_event(&event);
        }
        seen_id
    });

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut request = ChatRequest::new(message);
    request.conversation_id = conversation_id.clone();
    let outcome = orchestrator.process(request, &sink, &cancel).await;
    watcher.abort();
    drop(sink);

    if let Ok(Some(id)) = printer.await {
        *conversation_id = Some(id);
    }
    match outcome {
        Ok(_) => Ok(()),
        Err(PilotError::Cancelled) => {
            println!("\n(cancelled)");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn print_event(event: &StreamEvent) {
    match event {
        StreamEvent::Thinking { .. } => {}
        StreamEvent::Text { text, .. } => {
            print!("{}", text);
            let _ = std::io::stdout().flush();
        }
        StreamEvent::ToolCallStart {
            tool_name,
            arguments,
            ..
        } => {
            println!(
                "\n[tool] {} {}",
                tool_name,
                serde_json::Value::Object(arguments.clone())
            );
        }
        StreamEvent::ToolCallEnd {
            tool_name,
            result,
            status,
            ..
        } => {
            println!(
                "[tool] {} {:?}: {}",
                tool_name,
                status,
                preview(result, RESULT_PREVIEW_CHARS)
            );
        }
        StreamEvent::Complete { truncated, .. } => {
            if *truncated {
                println!("\n(stopped after the maximum number of tool rounds)");
            } else {
                println!();
            }
        }
        StreamEvent::Error { error, .. } => eprintln!("\nError: {}", error),
    }
}
