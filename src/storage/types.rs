use crate::providers::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a stored session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    /// Session id
    pub id: String,
    /// First user message, shortened
    pub title: String,
    /// When the session was first saved
    pub created_at: DateTime<Utc>,
    /// When the session was last saved
    pub updated_at: DateTime<Utc>,
    /// The model used in the session
    pub model: Option<String>,
    /// Number of messages in the session
    pub message_count: usize,
}

/// A saved session history
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    /// Session id as stored, which may be longer than the id used to look it up
    pub id: String,
    /// Title recorded at the last save
    pub title: String,
    /// Model recorded at the last save
    pub model: Option<String>,
    /// Full message history
    pub messages: Vec<Message>,
}
