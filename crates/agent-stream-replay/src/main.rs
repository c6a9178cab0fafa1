//! Replays a recorded agent event log through the chunk pipeline and writes
//! the NDJSON chunk protocol to stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use agent_stream_core::prelude::*;
use agent_stream_core::{ChatRequest, init_observability};
use clap::Parser;
use futures::StreamExt as _;
use tokio::io::AsyncWriteExt as _;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "agent-stream-replay", version, about)]
struct Args {
    /// JSONL file with one recorded agent event per line.
    #[arg(long, env = "AGENT_STREAM_REPLAY_EVENTS")]
    events: PathBuf,
    /// JSON chat request (`chat_messages` and `session_id`).
    #[arg(long, conflicts_with = "prompt")]
    messages: Option<PathBuf>,
    /// Single user message, used when no chat request file is given.
    #[arg(long)]
    prompt: Option<String>,
    /// Session id for `--prompt` requests.
    #[arg(long, default_value = "replay")]
    session_id: String,
    /// Trace id; generated when omitted.
    #[arg(long)]
    trace_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum ReplayError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid event on line {line}: {source}")]
    Event {
        line: usize,
        source: serde_json::Error,
    },
    #[error("invalid chat request: {0}")]
    Chat(serde_json::Error),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("failed to write output: {0}")]
    Output(std::io::Error),
}

fn parse_events(text: &str) -> Result<Vec<RawAgentEvent>, ReplayError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| ReplayError::Event {
                line: idx + 1,
                source,
            })
        })
        .collect()
}

async fn read_file(path: &Path) -> Result<String, ReplayError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })
}

async fn build_request(args: &Args, trace_id: String) -> Result<RespondRequest, ReplayError> {
    if let Some(path) = &args.messages {
        let chat: ChatRequest =
            serde_json::from_str(&read_file(path).await?).map_err(ReplayError::Chat)?;
        chat.validate()?;
        return Ok(RespondRequest::from_chat(chat, trace_id));
    }
    let prompt = args.prompt.clone().unwrap_or_default();
    Ok(RespondRequest::new(
        vec![Message::new(Role::User, prompt, trace_id.clone())],
        trace_id,
        args.session_id.clone(),
    ))
}

async fn run(args: Args) -> Result<(), ReplayError> {
    let events = parse_events(&read_file(&args.events).await?)?;
    info!(events = events.len(), path = %args.events.display(), "loaded recorded events");

    let driver = StreamDriver::builder()
        .agent(Arc::new(ScriptedAgent::new(events)))
        .config(PipelineConfig::from_env())
        .build()?;

    let trace_id = args.trace_id.clone().unwrap_or_else(new_trace_id);
    let request = build_request(&args, trace_id).await?;
    let mut lines = ndjson_lines(driver.respond(request).await?);

    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next().await {
        stdout
            .write_all(line?.as_bytes())
            .await
            .map_err(ReplayError::Output)?;
        stdout.flush().await.map_err(ReplayError::Output)?;
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_observability();
    run(Args::parse()).await?;
    Ok(())
}
