use crate::errors::StreamError;

/// One unit of the client-facing output protocol.
///
/// The pipeline builds chunks only through the named constructors below and
/// never modifies one afterwards; fields are public for reading. Normally
/// exactly one of `response` and `tool_call` is populated.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Chunk {
    pub trace_id: String,
    pub response: String,
    pub tool_call: String,
    pub is_finished: bool,
    pub is_thinking: bool,
    pub is_final_answer: bool,
    pub html_content: String,
}

impl Chunk {
    /// A line of the agent's visible reasoning.
    pub fn thinking(trace_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            response: text.into(),
            is_thinking: true,
            ..Self::default()
        }
    }

    /// A tool-call notification, optionally carrying rendered HTML.
    pub fn tool_call(
        trace_id: impl Into<String>,
        message: impl Into<String>,
        html_content: Option<String>,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            tool_call: message.into(),
            html_content: html_content.unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Marks the end of the thinking sub-stream. The final answer follows.
    pub fn thinking_finished(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            is_finished: true,
            is_thinking: true,
            ..Self::default()
        }
    }

    /// The authoritative answer for the request.
    pub fn final_answer(trace_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            response: text.into(),
            is_final_answer: true,
            ..Self::default()
        }
    }

    /// The sentinel that closes every request's stream.
    pub fn end_of_stream(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            is_finished: true,
            ..Self::default()
        }
    }

    /// Returns true for the request-level sentinel only.
    pub fn is_end_of_stream(&self) -> bool {
        self.is_finished
            && !self.is_thinking
            && !self.is_final_answer
            && self.response.is_empty()
            && self.tool_call.is_empty()
            && self.html_content.is_empty()
    }

    /// Serializes the chunk as one NDJSON record, including the trailing newline.
    pub fn to_ndjson_line(&self) -> Result<String, StreamError> {
        let mut line =
            serde_json::to_string(self).map_err(|e| StreamError::Serialization(e.to_string()))?;
        line.push('\n');
        Ok(line)
    }
}
