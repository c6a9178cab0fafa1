use tracing::{error, warn};

use crate::chunk::Chunk;
use crate::event::RawAgentEvent;

/// Where a request stands relative to the agent's completion marker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Thinking,
    AwaitingFinal,
    Done,
}

/// Tracks the completion marker and packages the single final answer.
#[derive(Debug, Default)]
pub struct FinalAnswerHandler {
    stage: Stage,
}

impl FinalAnswerHandler {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// True once the completion marker has been seen.
    pub fn is_past_thinking(&self) -> bool {
        self.stage != Stage::Thinking
    }

    /// Handles the completion marker. Emits the thinking-finished chunk the
    /// first time only.
    pub fn on_phase_completion(&mut self, trace_id: &str) -> Option<Chunk> {
        match self.stage {
            Stage::Thinking => {
                self.stage = Stage::AwaitingFinal;
                Some(Chunk::thinking_finished(trace_id))
            }
            Stage::AwaitingFinal | Stage::Done => {
                error!(trace_id, stage = ?self.stage, "duplicate phase completion event dropped");
                None
            }
        }
    }

    /// Handles the final output. Only the first one after the completion
    /// marker produces a chunk.
    pub fn on_final_output(&mut self, trace_id: &str, content: &str) -> Option<Chunk> {
        match self.stage {
            Stage::AwaitingFinal => {
                self.stage = Stage::Done;
                Some(Chunk::final_answer(trace_id, content))
            }
            Stage::Thinking => {
                warn!(trace_id, "final output before phase completion dropped");
                None
            }
            Stage::Done => {
                error!(trace_id, "unexpected second final output dropped");
                None
            }
        }
    }

    /// Any other event after the completion marker breaks the agent contract.
    pub fn reject(&self, trace_id: &str, event: &RawAgentEvent) {
        error!(trace_id, kind = event.kind(), stage = ?self.stage, "unexpected event after phase completion dropped");
    }
}
