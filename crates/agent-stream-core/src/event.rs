/// Events emitted by the reasoning agent, in the order it produces them.
///
/// A well-behaved agent yields narration deltas and tool results, then one
/// `PhaseCompletion`, then one `FinalOutput`. Any event kind this crate does
/// not know about deserializes to `Other` and is ignored.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawAgentEvent {
    /// A tool finished; `tool_output` is the tool result's debug rendering.
    ToolCallResult {
        tool_name: String,
        tool_output: String,
    },
    /// An incremental piece of the agent's free-text narration.
    NarrationDelta { delta: String },
    /// Reasoning has ended; the final answer follows.
    PhaseCompletion,
    /// The single authoritative answer.
    FinalOutput { content: String },
    #[serde(other)]
    Other,
}

impl RawAgentEvent {
    /// Short kind name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ToolCallResult { .. } => "tool_call_result",
            Self::NarrationDelta { .. } => "narration_delta",
            Self::PhaseCompletion => "phase_completion",
            Self::FinalOutput { .. } => "final_output",
            Self::Other => "other",
        }
    }
}
