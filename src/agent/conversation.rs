//! Append-only conversation history
//!
//! A [`Conversation`] is the ordered list of user, assistant and tool
//! messages of one session. Messages are only ever appended; nothing is
//! pruned, rewritten or reordered.

use crate::providers::{validate_message_sequence, Message, TokenUsage};
use serde::{Deserialize, Serialize};

/// Ordered, append-only message history
///
/// # Examples
///
/// ```
/// use stepwise::agent::Conversation;
///
/// let mut conversation = Conversation::new();
/// conversation.add_user_message("What's the weather in Paris?");
/// assert_eq!(conversation.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
    #[serde(skip)]
    usage: TokenUsage,
}

impl Conversation {
    /// Creates an empty conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a conversation from stored messages
    ///
    /// Orphan tool messages are dropped so the history can be sent to a model
    /// service that enforces request/observation pairing.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: validate_message_sequence(&messages),
            usage: TokenUsage::default(),
        }
    }

    /// Appends a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Appends a user message
    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    /// Appends a tool observation
    pub fn add_tool_result(&mut self, tool_call_id: impl Into<String>, content: impl Into<String>) {
        self.push(Message::tool_result(tool_call_id, content));
    }

    /// All messages in order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Most recent message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the conversation has no messages
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Adds provider-reported usage to the running total
    pub fn record_usage(&mut self, usage: &TokenUsage) {
        self.usage = TokenUsage::new(
            self.usage.prompt_tokens + usage.prompt_tokens,
            self.usage.completion_tokens + usage.completion_tokens,
        );
    }

    /// Token usage reported by the provider since the conversation was loaded
    pub fn usage(&self) -> TokenUsage {
        self.usage
    }
}
