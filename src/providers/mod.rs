//! Provider module for Stepwise
//!
//! This module contains the model service abstraction and implementations
//! for Groq (OpenAI-compatible chat completions) and Ollama.

pub mod base;
pub mod groq;
pub mod ollama;

pub use base::{
    validate_message_sequence, CompletionResponse, FunctionCall, Message, Provider, Role,
    TokenUsage, ToolCall,
};
pub use groq::GroqProvider;
pub use ollama::OllamaProvider;

use crate::config::ProviderConfig;
use crate::error::{Result, StepwiseError};

/// Create a provider instance based on configuration
///
/// # Arguments
///
/// * `provider_type` - Type of provider ("groq" or "ollama")
/// * `config` - Provider configuration
///
/// # Errors
///
/// Returns error if provider type is invalid or initialization fails
pub fn create_provider(provider_type: &str, config: &ProviderConfig) -> Result<Box<dyn Provider>> {
    match provider_type {
        "groq" => Ok(Box::new(GroqProvider::new(config.groq.clone())?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config.ollama.clone())?)),
        _ => Err(StepwiseError::Provider(format!(
            "Unknown provider type: {}",
            provider_type
        ))
        .into()),
    }
}
