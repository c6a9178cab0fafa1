//! Common imports for typical pipeline usage.
//!
//! This module intentionally exports the types needed to wire an agent into a
//! driver and consume its chunk stream.
pub use crate::{
    AgentError, AgentInput, Chunk, ChunkStream, Message, PipelineConfig, RawAgentEvent,
    ReasoningAgent, RespondRequest, Role, ScriptedAgent, StreamDriver, StreamError,
    TraceReporter, ndjson_lines, new_trace_id,
};
