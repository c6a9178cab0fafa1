use crate::errors::StreamError;

/// Author of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One prior conversation turn.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub content: String,
    pub role: Role,
    pub trace_id: String,
}

impl Message {
    /// Turn with an explicit trace id.
    pub fn new(role: Role, content: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role,
            trace_id: trace_id.into(),
        }
    }

    /// User turn with a freshly generated trace id.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, new_trace_id())
    }

    /// Assistant turn with a freshly generated trace id.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, new_trace_id())
    }
}

/// Chat payload as received at the request boundary.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatRequest {
    pub chat_messages: Vec<Message>,
    pub session_id: String,
}

impl ChatRequest {
    /// Rejects a chat without messages or whose latest message is empty.
    pub fn validate(&self) -> Result<(), StreamError> {
        validate_messages(&self.chat_messages)
    }
}

pub(crate) fn validate_messages(messages: &[Message]) -> Result<(), StreamError> {
    match messages.last() {
        Some(last) if !last.content.is_empty() => Ok(()),
        _ => Err(StreamError::Validation(
            "Chat messages cannot be empty".into(),
        )),
    }
}

/// Generates a trace id: a random UUID as 32 lowercase hex characters.
pub fn new_trace_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Renders the conversation as `Role: content` lines for the agent.
///
/// Assistant turns are stripped of the agent's own Thought/Action/Observation
/// lines so earlier reasoning is not fed back as context.
pub fn build_conversation_prompt(messages: &[Message]) -> String {
    messages
        .iter()
        .filter_map(|message| {
            let content = match message.role {
                Role::User => message.content.clone(),
                Role::Assistant => sanitize_assistant_content(&message.content),
            };
            if message.role == Role::Assistant && content.is_empty() {
                return None;
            }
            Some(format!("{}: {}", message.role.label(), content))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn sanitize_assistant_content(content: &str) -> String {
    content
        .lines()
        .filter(|line| !is_reasoning_line(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn is_reasoning_line(line: &str) -> bool {
    let stripped = line.trim_start_matches(|c: char| c.is_whitespace() || c == '*');
    ["Thought", "Action", "Observation"]
        .iter()
        .any(|marker| stripped.starts_with(marker))
}
