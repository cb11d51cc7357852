//! Executor: runs the tool requests of one assistant message
//!
//! The whole batch is parsed before any tool runs. An unregistered tool or a
//! malformed argument payload therefore fails the turn without side effects
//! from earlier requests in the same batch.

use crate::error::Result;
use crate::providers::{Message, ToolCall};
use crate::tools::{ToolRequest, ToolResult, Toolbox};
use tracing::{debug, info};

/// Hooks for surfacing progress while a turn runs
///
/// All methods default to doing nothing.
pub trait TurnObserver: Send + Sync {
    /// Called just before a tool request executes
    fn on_tool_call(&self, _request: &ToolRequest) {}

    /// Called after a tool request produced its observation
    fn on_tool_result(&self, _request: &ToolRequest, _result: &ToolResult) {}
}

/// Observer that ignores every event
pub struct SilentObserver;

impl TurnObserver for SilentObserver {}

/// Sequential tool executor
pub struct Executor {
    toolbox: Toolbox,
}

impl Executor {
    /// Create an executor over a toolbox
    pub fn new(toolbox: Toolbox) -> Self {
        Self { toolbox }
    }

    /// Tool definitions advertised to the model
    pub fn definitions(&self) -> Vec<serde_json::Value> {
        self.toolbox.definitions()
    }

    /// Whether any tool is available
    pub fn has_tools(&self) -> bool {
        !self.toolbox.is_empty()
    }

    /// Execute requests in order, one observation per request
    ///
    /// Each observation is a tool message whose `tool_call_id` matches the
    /// request it answers.
    ///
    /// # Errors
    ///
    /// Returns `StepwiseError::UnknownTool` or
    /// `StepwiseError::InvalidToolArguments` before anything runs, or an
    /// error raised by a tool itself
    pub async fn act(
        &self,
        calls: &[ToolCall],
        observer: &dyn TurnObserver,
    ) -> Result<Vec<Message>> {
        let requests = calls
            .iter()
            .map(|call| self.toolbox.parse(call).map(|request| (call, request)))
            .collect::<Result<Vec<_>>>()?;

        debug!("Executing {} tool calls", requests.len());

        let mut observations = Vec::with_capacity(requests.len());
        for (call, request) in requests {
            info!(tool = request.name(), id = %call.id, "Tool called: {}", request);
            observer.on_tool_call(&request);

            let result = self.toolbox.execute(request.clone()).await?;
            debug!(
                tool = request.name(),
                success = result.success,
                truncated = result.truncated,
                "Tool finished"
            );
            observer.on_tool_result(&request, &result);

            observations.push(Message::tool_result(call.id.clone(), result.to_message()));
        }
        Ok(observations)
    }
}
