use futures::StreamExt as _;
use futures::stream::{self, BoxStream};

use crate::errors::AgentError;
use crate::event::RawAgentEvent;

/// Event stream returned by a started agent run.
pub type AgentEventStream = BoxStream<'static, Result<RawAgentEvent, AgentError>>;

/// Input handed to the reasoning agent for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentInput {
    /// Assembled conversation prompt.
    pub prompt: String,
    pub trace_id: String,
    pub session_id: String,
}

/// External reasoning engine contract.
///
/// Implementations own the events they yield; the pipeline only borrows each
/// event while processing it.
#[async_trait::async_trait]
pub trait ReasoningAgent: Send + Sync {
    /// Starts a run and returns its event stream.
    async fn run(&self, input: AgentInput) -> Result<AgentEventStream, AgentError>;
}

/// Agent that replays a fixed, recorded event sequence.
#[derive(Clone, Debug, Default)]
pub struct ScriptedAgent {
    events: Vec<Result<RawAgentEvent, AgentError>>,
}

impl ScriptedAgent {
    /// Replays `events` in order, then ends the stream.
    pub fn new(events: Vec<RawAgentEvent>) -> Self {
        Self {
            events: events.into_iter().map(Ok).collect(),
        }
    }

    /// Replays `events`, including upstream failures at their positions.
    pub fn with_results(events: Vec<Result<RawAgentEvent, AgentError>>) -> Self {
        Self { events }
    }
}

#[async_trait::async_trait]
impl ReasoningAgent for ScriptedAgent {
    async fn run(&self, _input: AgentInput) -> Result<AgentEventStream, AgentError> {
        Ok(stream::iter(self.events.clone()).boxed())
    }
}
