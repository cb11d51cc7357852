//! Planner: one model call per planning step

use crate::error::Result;
use crate::providers::{CompletionResponse, Message, Provider};
use std::sync::Arc;
use tracing::debug;

/// Asks the model for the next step given the history so far
pub struct Planner {
    provider: Arc<dyn Provider>,
    system_prompt: String,
}

impl Planner {
    /// Create a planner around a provider
    pub fn new(provider: Arc<dyn Provider>, system_prompt: impl Into<String>) -> Self {
        Self {
            provider,
            system_prompt: system_prompt.into(),
        }
    }

    /// System prompt prepended to every request
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Model identifier of the underlying provider
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Request exactly one assistant message
    ///
    /// The request is `[system prompt] + history`; the history itself is not
    /// modified.
    ///
    /// # Errors
    ///
    /// Propagates provider errors unchanged
    pub async fn plan(
        &self,
        history: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<CompletionResponse> {
        let mut request = Vec::with_capacity(history.len() + 1);
        request.push(Message::system(self.system_prompt.clone()));
        request.extend_from_slice(history);

        debug!(
            messages = request.len(),
            tools = tools.len(),
            model = self.provider.model_name(),
            "Planning"
        );

        let response = self.provider.complete(&request, tools).await?;
        debug!(
            tool_calls = response.message.requested_tools().len(),
            "Planner response received"
        );
        Ok(response)
    }
}
