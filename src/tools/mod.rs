//! Tools module for Stepwise
//!
//! The model may request exactly two tools: `get_weather` and `run_command`.
//! Requests arrive as a name plus a JSON argument string and are parsed into
//! the closed [`ToolRequest`] enum before anything runs, so an unregistered
//! name or a malformed payload fails the turn instead of reaching a tool.

pub mod terminal;
pub mod weather;

pub use terminal::{CommandValidator, RunCommandArgs, ShellTool, NO_OUTPUT_PLACEHOLDER};
pub use weather::{WeatherArgs, WeatherTool, WEATHER_FAILURE};

use crate::config::ToolsConfig;
use crate::error::{Result, StepwiseError};
use crate::providers::ToolCall;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;

/// Result of executing one tool request
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// Whether the tool ran to completion
    pub success: bool,
    /// Output from the tool
    pub output: String,
    /// Error message if the tool refused or failed to run
    pub error: Option<String>,
    /// Whether the output was truncated
    pub truncated: bool,
    /// Additional metadata about the execution
    pub metadata: HashMap<String, String>,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            truncated: false,
            metadata: HashMap::new(),
        }
    }

    /// Create a failed tool result
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
            truncated: false,
            metadata: HashMap::new(),
        }
    }

    /// Add metadata to the result
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Truncate output if it exceeds `max_size` bytes
    ///
    /// The cut is moved back to the nearest character boundary.
    pub fn truncate_if_needed(mut self, max_size: usize) -> Self {
        if self.output.len() > max_size {
            let mut cut = max_size;
            while !self.output.is_char_boundary(cut) {
                cut -= 1;
            }
            self.output.truncate(cut);
            self.output.push_str("\n... (truncated)");
            self.truncated = true;
        }
        self
    }

    /// Observation text appended to the conversation
    pub fn to_message(&self) -> String {
        if self.success {
            self.output.clone()
        } else {
            format!(
                "Error: {}",
                self.error.as_deref().unwrap_or("Unknown error")
            )
        }
    }
}

/// A tool with typed arguments
///
/// # Examples
///
/// ```no_run
/// use async_trait::async_trait;
/// use serde::Deserialize;
/// use stepwise::error::Result;
/// use stepwise::tools::{ToolExecutor, ToolResult};
///
/// #[derive(Deserialize)]
/// struct EchoArgs {
///     text: String,
/// }
///
/// struct EchoTool;
///
/// #[async_trait]
/// impl ToolExecutor for EchoTool {
///     type Args = EchoArgs;
///     const NAME: &'static str = "echo";
///
///     fn tool_definition(&self) -> serde_json::Value {
///         serde_json::json!({
///             "name": Self::NAME,
///             "description": "Echo text back",
///             "parameters": {"type": "object", "properties": {"text": {"type": "string"}}}
///         })
///     }
///
///     async fn execute(&self, args: EchoArgs) -> Result<ToolResult> {
///         Ok(ToolResult::success(args.text))
///     }
/// }
/// ```
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Argument payload, parsed from the model's JSON string
    type Args: DeserializeOwned + Send + 'static;

    /// Name the model uses to request this tool
    const NAME: &'static str;

    /// OpenAI-style function definition (`name`, `description`, `parameters`)
    fn tool_definition(&self) -> serde_json::Value;

    /// Executes the tool
    ///
    /// # Errors
    ///
    /// Returns error only for failures that must abort the turn; recoverable
    /// failures are reported through [`ToolResult::error`]
    async fn execute(&self, args: Self::Args) -> Result<ToolResult>;
}

/// Parsed tool request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
    /// `get_weather(city)`
    Weather(WeatherArgs),
    /// `run_command(command)`
    RunCommand(RunCommandArgs),
}

impl ToolRequest {
    /// Name of the requested tool
    pub fn name(&self) -> &'static str {
        match self {
            ToolRequest::Weather(_) => WeatherTool::NAME,
            ToolRequest::RunCommand(_) => ShellTool::NAME,
        }
    }
}

impl fmt::Display for ToolRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolRequest::Weather(args) => write!(f, "{}({})", self.name(), args.city),
            ToolRequest::RunCommand(args) => write!(f, "{}({})", self.name(), args.command),
        }
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: &str) -> Result<T> {
    // Some models send an empty string for argument-less calls
    let raw = if arguments.trim().is_empty() {
        "{}"
    } else {
        arguments
    };
    serde_json::from_str(raw).map_err(|e| {
        StepwiseError::InvalidToolArguments {
            tool: tool.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

/// The set of tools offered to the model for a session
///
/// A disabled tool is neither advertised nor accepted: requesting it is the
/// same as requesting a name that never existed.
pub struct Toolbox {
    weather: Option<WeatherTool>,
    shell: Option<ShellTool>,
    max_output_size: usize,
}

impl Toolbox {
    /// Build the toolbox described by configuration
    ///
    /// # Errors
    ///
    /// Returns error if the weather base URL is invalid or an HTTP client
    /// cannot be created
    pub fn from_config(config: &ToolsConfig) -> Result<Self> {
        let weather = if config.weather.enabled {
            Some(WeatherTool::new(&config.weather)?)
        } else {
            None
        };
        let shell = config
            .terminal
            .enabled
            .then(|| ShellTool::new(&config.terminal));

        tracing::debug!(
            weather = weather.is_some(),
            run_command = shell.is_some(),
            "Built toolbox"
        );

        Ok(Self {
            weather,
            shell,
            max_output_size: config.max_output_size,
        })
    }

    /// A toolbox offering nothing, for plain chat
    pub fn empty() -> Self {
        Self {
            weather: None,
            shell: None,
            max_output_size: usize::MAX,
        }
    }

    /// Whether no tools are offered
    pub fn is_empty(&self) -> bool {
        self.weather.is_none() && self.shell.is_none()
    }

    /// Definitions of the enabled tools, in a stable order
    pub fn definitions(&self) -> Vec<serde_json::Value> {
        let mut defs = Vec::new();
        if let Some(tool) = &self.weather {
            defs.push(tool.tool_definition());
        }
        if let Some(tool) = &self.shell {
            defs.push(tool.tool_definition());
        }
        defs
    }

    /// Parse a model tool call into a typed request
    ///
    /// # Errors
    ///
    /// Returns `StepwiseError::UnknownTool` for a name that is not enabled and
    /// `StepwiseError::InvalidToolArguments` when the payload does not match
    pub fn parse(&self, call: &ToolCall) -> Result<ToolRequest> {
        let name = call.function.name.as_str();
        let arguments = call.function.arguments.as_str();
        match name {
            weather::TOOL_NAME if self.weather.is_some() => {
                Ok(ToolRequest::Weather(parse_args(name, arguments)?))
            }
            terminal::TOOL_NAME if self.shell.is_some() => {
                Ok(ToolRequest::RunCommand(parse_args(name, arguments)?))
            }
            _ => {
                tracing::error!("Model requested unregistered tool: {}", name);
                Err(StepwiseError::UnknownTool(name.to_string()).into())
            }
        }
    }

    /// Execute a parsed request and apply the output size limit
    ///
    /// # Errors
    ///
    /// Propagates errors from the tool itself
    pub async fn execute(&self, request: ToolRequest) -> Result<ToolResult> {
        let result = match request {
            ToolRequest::Weather(args) => match &self.weather {
                Some(tool) => tool.execute(args).await?,
                None => return Err(StepwiseError::UnknownTool(WeatherTool::NAME.into()).into()),
            },
            ToolRequest::RunCommand(args) => match &self.shell {
                Some(tool) => tool.execute(args).await?,
                None => return Err(StepwiseError::UnknownTool(ShellTool::NAME.into()).into()),
            },
        };
        Ok(result.truncate_if_needed(self.max_output_size))
    }
}
