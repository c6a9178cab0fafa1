/// Errors raised by a reasoning agent, either when a run is started or while
/// its event stream is being consumed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    /// The agent could not start a run.
    #[error("failed to start agent run: {0}")]
    Start(String),
    /// The agent failed after its event stream was established.
    #[error("{0}")]
    Stream(String),
}

impl AgentError {
    /// Creates a start-time error.
    pub fn start(message: impl Into<String>) -> Self {
        Self::Start(message.into())
    }

    /// Creates a mid-stream error.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream(message.into())
    }
}

/// Failure reported by a tracing collaborator. Never fatal to a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("trace report failed: {0}")]
pub struct TraceError(pub String);

/// Top-level error type for the streaming pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Invalid request input.
    #[error("validation error: {0}")]
    Validation(String),
    /// Invalid driver configuration.
    #[error("config error: {0}")]
    Config(String),
    /// A tool result violated the structure the chunk builder relies on.
    #[error("exception handling tool call ({tool}): {message}")]
    ToolCall { tool: String, message: String },
    /// The reasoning agent failed.
    #[error("Error running agent: {0}")]
    Agent(AgentError),
    /// A chunk could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StreamError {
    pub(crate) fn tool_call(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolCall {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

impl From<AgentError> for StreamError {
    fn from(value: AgentError) -> Self {
        StreamError::Agent(value)
    }
}
