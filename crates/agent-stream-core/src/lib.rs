//! Streaming core that turns a reasoning agent's event sequence into a
//! client-facing, newline-delimited JSON chunk protocol.
//!
//! The agent itself is an injected collaborator (`ReasoningAgent`); this crate
//! only classifies what it emits, decodes tool output, filters internal
//! narration and guarantees a single terminal sentinel per request.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use agent_stream_core::prelude::*;
//! use futures::StreamExt as _;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), StreamError> {
//! let agent = ScriptedAgent::new(vec![
//!     RawAgentEvent::NarrationDelta { delta: "Thought: easy one".into() },
//!     RawAgentEvent::PhaseCompletion,
//!     RawAgentEvent::FinalOutput { content: "4".into() },
//! ]);
//! let driver = StreamDriver::builder()
//!     .agent(Arc::new(agent))
//!     .config(PipelineConfig::from_env())
//!     .build()?;
//!
//! let request = RespondRequest::new(
//!     vec![Message::user("What is 2+2?")],
//!     new_trace_id(),
//!     "session-1",
//! );
//! let mut lines = ndjson_lines(driver.respond(request).await?);
//! while let Some(line) = lines.next().await {
//!     print!("{}", line?);
//! }
//! # Ok(())
//! # }
//! ```

/// Reasoning agent contract and a scripted implementation.
pub mod agent;
/// Client-visible chunk type.
pub mod chunk;
/// Pipeline configuration.
pub mod config;
/// Chat request types and prompt assembly.
pub mod conversation;
/// Decoder for stringified tool output.
pub mod decode;
/// Stream driver and the per-request chunk pipeline.
pub mod driver;
/// Public error types.
pub mod errors;
/// Raw events produced by the reasoning agent.
pub mod event;
/// Line filter for thinking fragments.
pub mod filter;
/// Phase-completion and final-answer handling.
pub mod final_answer;
/// Process-wide logging setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Narration segmentation by phase markers.
pub mod segment;
/// Tool-call notification chunks.
pub mod tool_call;
/// Tracing collaborator contract.
pub mod tracer;

pub use agent::{AgentEventStream, AgentInput, ReasoningAgent, ScriptedAgent};
pub use chunk::Chunk;
pub use config::PipelineConfig;
pub use conversation::{ChatRequest, Message, Role, build_conversation_prompt, new_trace_id};
pub use decode::{TextPayload, ToolOutputRecord, decode_tool_output};
pub use driver::{
    ChunkPipeline, ChunkStream, RespondRequest, StreamDriver, StreamDriverBuilder, ndjson_lines,
};
pub use errors::{AgentError, StreamError, TraceError};
pub use event::RawAgentEvent;
pub use filter::thinking_lines;
pub use final_answer::{FinalAnswerHandler, Stage};
pub use observability::init_observability;
pub use segment::{Phase, Segmenter};
pub use tool_call::build_tool_call_chunk;
pub use tracer::{LogTraceReporter, TraceContext, TraceReporter};
