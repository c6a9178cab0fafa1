//! Splits narration deltas on the agent's inline phase markers.
//!
//! The agent narrates in one text stream with `Thought`, `Action` and
//! `Answer` markers embedded in it. A single delta can cross a phase
//! boundary, so deltas are re-split on `Action` and every fragment is
//! classified on its own.

use tracing::trace;

const THOUGHT_MARKER: &str = "Thought";
const ACTION_MARKER: &str = "Action";
const ANSWER_MARKER: &str = "Answer";

/// Which part of the agent's reasoning the current narration belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Thinking,
    Acting,
    /// Absorbing: markers are ignored once the agent starts answering.
    Answering,
}

/// Per-request segmenter holding the current phase.
#[derive(Debug, Default)]
pub struct Segmenter {
    phase: Phase,
}

impl Segmenter {
    /// Starts in `Phase::Thinking`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Classifies `delta` and returns the fragments that belong to the
    /// thinking phase, in order.
    pub fn segment(&mut self, delta: &str) -> Vec<String> {
        let mut retained = Vec::new();
        for fragment in split_on_action(delta) {
            let fragment = self.advance(fragment);
            if self.phase == Phase::Thinking && !fragment.is_empty() {
                retained.push(fragment.to_string());
            }
        }
        retained
    }

    fn advance<'a>(&mut self, fragment: &'a str) -> &'a str {
        if self.phase == Phase::Answering {
            return fragment;
        }
        let previous = self.phase;
        let mut fragment = fragment;
        if fragment.starts_with(ACTION_MARKER) {
            self.phase = Phase::Acting;
        } else if let Some(idx) = fragment.find(THOUGHT_MARKER) {
            self.phase = Phase::Thinking;
            fragment = &fragment[idx..];
        } else if fragment.contains(ANSWER_MARKER) {
            self.phase = Phase::Answering;
        }
        if previous != self.phase {
            trace!(from = ?previous, to = ?self.phase, "narration phase changed");
        }
        fragment
    }
}

/// Splits on `Action`, keeping the marker at the start of every fragment
/// after the first.
fn split_on_action(delta: &str) -> Vec<&str> {
    let mut fragments = Vec::new();
    let mut start = 0;
    for (idx, _) in delta.match_indices(ACTION_MARKER) {
        fragments.push(&delta[start..idx]);
        start = idx;
    }
    fragments.push(&delta[start..]);
    fragments
}
