use tracing::info;

use crate::errors::TraceError;

/// Per-request association reported to the tracing collaborator.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct TraceContext {
    pub trace_id: String,
    pub session_id: String,
    /// Prompt the agent is run with.
    pub input: String,
}

/// Side-channel observability collaborator.
///
/// Constructed once at process start and shared by every request. A failed
/// report is logged by the driver and never interrupts chunk delivery.
#[async_trait::async_trait]
pub trait TraceReporter: Send + Sync {
    /// Associates the trace id with the session and the prompt.
    async fn report(&self, ctx: &TraceContext) -> Result<(), TraceError>;
}

/// Reports traces as structured log events.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogTraceReporter;

#[async_trait::async_trait]
impl TraceReporter for LogTraceReporter {
    async fn report(&self, ctx: &TraceContext) -> Result<(), TraceError> {
        info!(
            trace_id = %ctx.trace_id,
            session_id = %ctx.session_id,
            input_len = ctx.input.len(),
            "trace started"
        );
        Ok(())
    }
}
