//! Configuration management for Stepwise
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{Result, StepwiseError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Stepwise
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Model service configuration (Groq, Ollama)
    pub provider: ProviderConfig,
    /// Agent loop and tool configuration
    #[serde(default)]
    pub agent: AgentConfig,
    /// Checkpoint store configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Provider configuration
///
/// Specifies which model service to call and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use
    #[serde(rename = "type")]
    pub provider_type: String,

    /// Groq (OpenAI-compatible) configuration
    #[serde(default)]
    pub groq: GroqConfig,

    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,
}

/// OpenAI-compatible chat completions configuration, Groq by default
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqConfig {
    /// Base URL; `/chat/completions` is appended
    #[serde(default = "default_groq_api_base")]
    pub api_base: String,

    /// Model identifier
    #[serde(default = "default_groq_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_groq_api_base() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_groq_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_base: default_groq_api_base(),
            model: default_groq_model(),
            temperature: default_temperature(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama server host
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Model to use for Ollama
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:latest".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_ollama_model(),
        }
    }
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum number of planner calls in a single user turn
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Replacement for the built-in system prompt
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_max_turns() -> usize {
    25
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            system_prompt: None,
            tools: ToolsConfig::default(),
        }
    }
}

/// Tool configuration shared by all tools plus per-tool sections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Maximum observation size in bytes before truncation
    #[serde(default = "default_max_output")]
    pub max_output_size: usize,

    /// Weather lookup tool
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Shell command tool
    #[serde(default)]
    pub terminal: TerminalConfig,
}

fn default_max_output() -> usize {
    1_048_576 // 1 MB
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_output_size: default_max_output(),
            weather: WeatherConfig::default(),
            terminal: TerminalConfig::default(),
        }
    }
}

/// Weather tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Offer `get_weather` to the model
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Weather service base URL; the city is appended as a path segment
    #[serde(default = "default_weather_url")]
    pub base_url: String,

    /// HTTP timeout (seconds)
    #[serde(default = "default_weather_timeout")]
    pub timeout_seconds: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_weather_url() -> String {
    "http://wttr.in".to_string()
}

fn default_weather_timeout() -> u64 {
    30
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            base_url: default_weather_url(),
            timeout_seconds: default_weather_timeout(),
        }
    }
}

/// Terminal execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Offer `run_command` to the model
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Capability boundary applied to every command
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Optional timeout for a single command (seconds); unlimited when unset
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            mode: ExecutionMode::default(),
            timeout_seconds: None,
        }
    }
}

/// Terminal execution mode
///
/// Controls how commands requested by the model are validated before they
/// reach the shell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Deny-list plus an allow-list of read-only utilities
    #[default]
    Restricted,
    /// Sandbox-only: any command not on the deny-list is passed to the shell verbatim
    Unrestricted,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Restricted => write!(f, "restricted"),
            ExecutionMode::Unrestricted => write!(f, "unrestricted"),
        }
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = StepwiseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "restricted" => Ok(ExecutionMode::Restricted),
            "unrestricted" => Ok(ExecutionMode::Unrestricted),
            other => Err(StepwiseError::Config(format!(
                "Invalid execution mode: {}. Must be one of: restricted, unrestricted",
                other
            ))),
        }
    }
}

/// Checkpoint store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file; the platform data directory is used when unset
    #[serde(default)]
    pub path: Option<String>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default_config()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn default_config() -> Self {
        Self {
            provider: ProviderConfig {
                provider_type: "groq".to_string(),
                groq: GroqConfig::default(),
                ollama: OllamaConfig::default(),
            },
            agent: AgentConfig::default(),
            storage: StorageConfig::default(),
        }
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| StepwiseError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| StepwiseError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(provider_type) = std::env::var("STEPWISE_PROVIDER") {
            self.provider.provider_type = provider_type;
        }

        // Applies to whichever provider is selected
        if let Ok(model) = std::env::var("STEPWISE_MODEL") {
            match self.provider.provider_type.as_str() {
                "ollama" => self.provider.ollama.model = model,
                _ => self.provider.groq.model = model,
            }
        }

        if let Ok(api_base) = std::env::var("STEPWISE_GROQ_API_BASE") {
            self.provider.groq.api_base = api_base;
        }

        if let Ok(ollama_host) = std::env::var("STEPWISE_OLLAMA_HOST") {
            self.provider.ollama.host = ollama_host;
        }

        if let Ok(max_turns) = std::env::var("STEPWISE_MAX_TURNS") {
            if let Ok(value) = max_turns.parse() {
                self.agent.max_turns = value;
            } else {
                tracing::warn!("Invalid STEPWISE_MAX_TURNS: {}", max_turns);
            }
        }

        if let Ok(mode) = std::env::var("STEPWISE_EXECUTION_MODE") {
            self.agent.tools.terminal.mode = mode.parse().unwrap_or_else(|_| {
                tracing::warn!("Invalid execution mode: {}, using default", mode);
                ExecutionMode::default()
            });
        }

        if let Ok(url) = std::env::var("STEPWISE_WEATHER_URL") {
            self.agent.tools.weather.base_url = url;
        }

        if let Ok(db) = std::env::var("STEPWISE_HISTORY_DB") {
            tracing::debug!(path = %db, "Env override: STEPWISE_HISTORY_DB");
            self.storage.path = Some(db);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(db) = &cli.storage_path {
            tracing::info!("Using storage DB override from CLI: {}", db);
            self.storage.path = Some(db.clone());
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns the first failing check as a `StepwiseError::Config`
    pub fn validate(&self) -> Result<()> {
        if self.provider.provider_type.is_empty() {
            return Err(StepwiseError::Config("Provider type cannot be empty".to_string()).into());
        }

        let valid_providers = ["groq", "ollama"];
        if !valid_providers.contains(&self.provider.provider_type.as_str()) {
            return Err(StepwiseError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                valid_providers.join(", ")
            ))
            .into());
        }

        if !(0.0..=2.0).contains(&self.provider.groq.temperature) {
            return Err(StepwiseError::Config(
                "provider.groq.temperature must be between 0.0 and 2.0".to_string(),
            )
            .into());
        }

        if self.agent.max_turns == 0 {
            return Err(
                StepwiseError::Config("max_turns must be greater than 0".to_string()).into(),
            );
        }

        if self.agent.max_turns > 1000 {
            return Err(StepwiseError::Config(
                "max_turns must be less than or equal to 1000".to_string(),
            )
            .into());
        }

        if self.agent.tools.max_output_size == 0 {
            return Err(StepwiseError::Config(
                "tools.max_output_size must be greater than 0".to_string(),
            )
            .into());
        }

        if self.agent.tools.weather.base_url.trim().is_empty() {
            return Err(StepwiseError::Config(
                "tools.weather.base_url cannot be empty".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
