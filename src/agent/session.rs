//! Session state passed into every turn

use crate::agent::Conversation;
use crate::providers::Message;

/// One conversation identified by a session id
///
/// The agent never holds conversation state itself: callers own the session
/// and hand it to [`Agent::run_turn`](crate::agent::Agent::run_turn), which
/// commits the turn's messages only when the turn succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Checkpoint key
    pub id: String,
    /// History of user, assistant and tool messages
    pub conversation: Conversation,
}

impl Session {
    /// Start a session with a freshly generated id
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    /// Start an empty session under a caller-chosen id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            conversation: Conversation::new(),
        }
    }

    /// Resume a session from checkpointed messages
    pub fn resume(id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            id: id.into(),
            conversation: Conversation::from_messages(messages),
        }
    }

    /// Title derived from the first user message, if any
    pub fn title(&self) -> Option<String> {
        const MAX_TITLE_CHARS: usize = 50;

        self.conversation
            .messages()
            .iter()
            .find(|m| m.role == crate::providers::Role::User)
            .map(|m| {
                let text = m.text().trim();
                if text.chars().count() > MAX_TITLE_CHARS {
                    let cut: String = text.chars().take(MAX_TITLE_CHARS).collect();
                    format!("{}...", cut)
                } else {
                    text.to_string()
                }
            })
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
