//! System prompts
//!
//! The system prompt is never stored in a session's history. The planner
//! prepends it on every model call, so changing it in configuration takes
//! effect for resumed sessions too.

use crate::config::AgentConfig;

/// Built-in system prompt used when `agent.system_prompt` is not set
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI Assistant who resolves user queries.
You have access to tools. Use them step by step when needed.
Always reason through the problem before calling a tool.";

/// Prompt for plain chat without tools
pub const PLAIN_CHAT_PROMPT: &str = "You are a helpful AI Assistant who resolves user queries.";

/// Resolve the system prompt for a session
///
/// A configured prompt wins; otherwise the built-in prompt matching whether
/// tools are offered.
///
/// # Examples
///
/// ```
/// use stepwise::config::AgentConfig;
/// use stepwise::prompts::{build_system_prompt, DEFAULT_SYSTEM_PROMPT};
///
/// let prompt = build_system_prompt(&AgentConfig::default(), true);
/// assert_eq!(prompt, DEFAULT_SYSTEM_PROMPT);
/// ```
pub fn build_system_prompt(config: &AgentConfig, tools_enabled: bool) -> String {
    match config.system_prompt.as_deref().map(str::trim) {
        Some(custom) if !custom.is_empty() => custom.to_string(),
        _ if tools_enabled => DEFAULT_SYSTEM_PROMPT.to_string(),
        _ => PLAIN_CHAT_PROMPT.to_string(),
    }
}
