//! Error types for Stepwise
//!
//! All failures that can abort a turn, a command or startup are expressed
//! as variants of [`StepwiseError`]. Call sites wrap them in `anyhow` through
//! the [`Result`] alias so context can be attached while propagating.

use thiserror::Error;

/// Main error type for Stepwise operations
#[derive(Error, Debug)]
pub enum StepwiseError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Model service errors (transport, non-success status, bad payload)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Missing credentials for provider
    #[error("Missing credentials for provider: {0}")]
    MissingCredentials(String),

    /// Tool execution errors
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// The model requested a tool that is not registered (or is disabled)
    #[error("Unregistered tool: {0}")]
    UnknownTool(String),

    /// Tool arguments did not match the tool's schema
    #[error("Invalid arguments for tool {tool}: {message}")]
    InvalidToolArguments {
        /// Name of the tool whose arguments failed to parse
        tool: String,
        /// Parser message
        message: String,
    },

    /// Command matched the deny-list
    #[error("Dangerous command detected: {0}")]
    DangerousCommand(String),

    /// Command is not on the allow-list for the current execution mode
    #[error("Command not allowed in restricted mode: {0}")]
    CommandNotAllowed(String),

    /// Command names a path outside the working directory
    #[error("Path validation failed: {0}")]
    PathOutsideWorkingDirectory(String),

    /// Agent exceeded maximum iteration limit
    #[error("Agent exceeded maximum iterations: limit={limit}, {message}")]
    MaxIterationsExceeded {
        /// The configured iteration limit
        limit: usize,
        /// Additional context about the failure
        message: String,
    },

    /// Checkpoint store errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Stepwise operations
///
/// Uses `anyhow::Error` so callers can add context with `.context(..)`
/// and still downcast to [`StepwiseError`] when they need to branch.
pub type Result<T> = anyhow::Result<T>;
