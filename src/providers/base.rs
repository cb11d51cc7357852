//! Base provider trait and common message types
//!
//! Every model service is reached through [`Provider::complete`], which takes
//! the full message list (system prompt first) plus the JSON schemas of the
//! tools on offer and returns exactly one assistant message.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions prepended by the planner, never stored in history
    System,
    /// Text typed by the user
    User,
    /// Model output: a final answer or a batch of tool requests
    Assistant,
    /// Observation produced by executing a tool request
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// Message structure for conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Ordered tool requests carried by an assistant message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Request id answered by a tool message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use stepwise::providers::{Message, Role};
    ///
    /// let msg = Message::user("What's the weather in Paris?");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a new assistant message holding a final answer
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a tool observation answering the request `tool_call_id`
    ///
    /// # Examples
    ///
    /// ```
    /// use stepwise::providers::{Message, Role};
    ///
    /// let msg = Message::tool_result("call_1", "The weather in Paris is Sunny +18°C.");
    /// assert_eq!(msg.role, Role::Tool);
    /// assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
    /// ```
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Creates an assistant message carrying tool requests
    pub fn assistant_with_tools(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// Tool requests carried by this message, empty for anything but an
    /// assistant message that asked for tools
    pub fn requested_tools(&self) -> &[ToolCall] {
        match (&self.role, &self.tool_calls) {
            (Role::Assistant, Some(calls)) => calls,
            _ => &[],
        }
    }

    /// Content as a string slice, empty when absent
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// Function call information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the tool to call
    pub name: String,
    /// Arguments for the tool, as a JSON string
    pub arguments: String,
}

/// A request from the model to execute a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Function call details
    pub function: FunctionCall,
}

impl ToolCall {
    /// Convenience constructor used by providers and tests
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Token usage reported by the model service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: usize,
    /// Number of tokens in the completion
    pub completion_tokens: usize,
    /// Total tokens used (prompt + completion)
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Create a new TokenUsage instance
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Completion response with message and optional token usage
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The response message from the model
    pub message: Message,
    /// Optional token usage information
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    /// Create a new CompletionResponse
    pub fn new(message: Message) -> Self {
        Self {
            message,
            usage: None,
        }
    }

    /// Create a new CompletionResponse with token usage
    pub fn with_usage(message: Message, usage: TokenUsage) -> Self {
        Self {
            message,
            usage: Some(usage),
        }
    }
}

/// Provider trait for hosted model services
///
/// # Examples
///
/// ```no_run
/// use stepwise::providers::{CompletionResponse, Message, Provider};
/// use stepwise::error::Result;
/// use async_trait::async_trait;
///
/// struct EchoProvider;
///
/// #[async_trait]
/// impl Provider for EchoProvider {
///     async fn complete(
///         &self,
///         messages: &[Message],
///         _tools: &[serde_json::Value],
///     ) -> Result<CompletionResponse> {
///         let last = messages.last().map(|m| m.text().to_string()).unwrap_or_default();
///         Ok(CompletionResponse::new(Message::assistant(last)))
///     }
///
///     fn model_name(&self) -> &str {
///         "echo"
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Completes a conversation with the given messages and available tools
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be sent, the service answers with a
    /// non-success status, or the body cannot be parsed
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<CompletionResponse>;

    /// Model identifier used for requests, recorded with stored sessions
    fn model_name(&self) -> &str;
}

/// Drops tool messages whose request id has no matching assistant request
///
/// Histories loaded from a checkpoint may have been edited or truncated; model
/// services reject orphan tool messages, so they are removed before sending.
///
/// # Examples
///
/// ```
/// use stepwise::providers::{validate_message_sequence, Message};
///
/// let messages = vec![
///     Message::user("Do something"),
///     Message::tool_result("call_123", "Result"),
/// ];
/// assert_eq!(validate_message_sequence(&messages).len(), 1);
/// ```
pub fn validate_message_sequence(messages: &[Message]) -> Vec<Message> {
    use std::collections::HashSet;

    let valid_tool_ids: HashSet<&str> = messages
        .iter()
        .flat_map(|m| m.requested_tools())
        .map(|call| call.id.as_str())
        .collect();

    messages
        .iter()
        .filter(|message| {
            if message.role != Role::Tool {
                return true;
            }
            match &message.tool_call_id {
                Some(id) if valid_tool_ids.contains(id.as_str()) => true,
                Some(id) => {
                    tracing::warn!("Dropping orphan tool message with tool_call_id: {}", id);
                    false
                }
                None => {
                    tracing::warn!("Dropping tool message without tool_call_id");
                    false
                }
            }
        })
        .cloned()
        .collect()
}
