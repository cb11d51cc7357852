//! Ollama provider implementation
//!
//! Talks to a local or remote Ollama server through `POST /api/chat` with
//! streaming disabled, so every call yields exactly one assistant message.

use crate::config::OllamaConfig;
use crate::error::{Result, StepwiseError};
use crate::providers::{
    validate_message_sequence, CompletionResponse, Message, Provider, TokenUsage, ToolCall,
};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama API provider
///
/// # Examples
///
/// ```no_run
/// use stepwise::config::OllamaConfig;
/// use stepwise::providers::{Message, OllamaProvider, Provider};
///
/// # async fn example() -> stepwise::error::Result<()> {
/// let provider = OllamaProvider::new(OllamaConfig::default())?;
/// let completion = provider.complete(&[Message::user("Hello!")], &[]).await?;
/// println!("{}", completion.message.text());
/// # Ok(())
/// # }
/// ```
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Debug, Serialize)]
struct OllamaTool {
    r#type: String,
    function: OllamaFunction,
}

#[derive(Debug, Serialize)]
struct OllamaFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    #[serde(default)]
    id: String,
    function: OllamaFunctionCall,
}

/// Ollama sends arguments as a JSON object, not an encoded string
#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: usize,
    #[serde(default)]
    eval_count: usize,
}

impl OllamaProvider {
    /// Create a new Ollama provider instance
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("stepwise/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StepwiseError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Ollama provider: host={}, model={}",
            config.host,
            config.model
        );

        Ok(Self { client, config })
    }

    /// Configured Ollama host
    pub fn host(&self) -> &str {
        &self.config.host
    }

    fn convert_messages(&self, messages: &[Message]) -> Vec<OllamaMessage> {
        validate_message_sequence(messages)
            .into_iter()
            .filter(|m| m.content.is_some() || m.tool_calls.is_some())
            .map(|m| {
                let tool_calls = m.tool_calls.map(|calls| {
                    calls
                        .into_iter()
                        .map(|tc| OllamaToolCall {
                            id: tc.id,
                            function: OllamaFunctionCall {
                                name: tc.function.name,
                                arguments: serde_json::from_str(&tc.function.arguments)
                                    .unwrap_or_else(|_| serde_json::json!({})),
                            },
                        })
                        .collect()
                });

                OllamaMessage {
                    role: m.role.to_string(),
                    content: m.content.unwrap_or_default(),
                    tool_calls,
                }
            })
            .collect()
    }

    fn convert_tools(&self, tools: &[serde_json::Value]) -> Vec<OllamaTool> {
        tools
            .iter()
            .filter_map(|t| {
                let obj = t.as_object()?;
                Some(OllamaTool {
                    r#type: "function".to_string(),
                    function: OllamaFunction {
                        name: obj.get("name")?.as_str()?.to_string(),
                        description: obj.get("description")?.as_str()?.to_string(),
                        parameters: obj.get("parameters")?.clone(),
                    },
                })
            })
            .collect()
    }

    fn convert_response_message(&self, ollama_msg: OllamaMessage) -> Message {
        match ollama_msg.tool_calls {
            Some(tool_calls) if !tool_calls.is_empty() => {
                let converted = tool_calls
                    .into_iter()
                    .map(|tc| {
                        // Ollama omits ids; generate one so observations can be paired
                        let id = if tc.id.is_empty() {
                            format!("call_{}", uuid::Uuid::new_v4().simple())
                        } else {
                            tc.id
                        };
                        let arguments = serde_json::to_string(&tc.function.arguments)
                            .unwrap_or_else(|_| "{}".to_string());
                        ToolCall::new(id, tc.function.name, arguments)
                    })
                    .collect();
                let mut message = Message::assistant_with_tools(converted);
                if !ollama_msg.content.is_empty() {
                    message.content = Some(ollama_msg.content);
                }
                message
            }
            _ => Message::assistant(ollama_msg.content),
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<CompletionResponse> {
        let url = format!("{}/api/chat", self.config.host.trim_end_matches('/'));

        let ollama_request = OllamaRequest {
            model: self.config.model.clone(),
            messages: self.convert_messages(messages),
            tools: self.convert_tools(tools),
            stream: false,
        };

        tracing::debug!(
            "Sending Ollama request: {} messages, {} tools",
            ollama_request.messages.len(),
            ollama_request.tools.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Ollama request failed: {}", e);
                StepwiseError::Provider(format!("Ollama request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Ollama returned error {}: {}", status, error_text);
            return Err(StepwiseError::Provider(format!(
                "Ollama returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Ollama response: {}", e);
            StepwiseError::Provider(format!("Failed to parse Ollama response: {}", e))
        })?;

        tracing::debug!(
            "Ollama response: done={}, prompt_tokens={}, completion_tokens={}",
            ollama_response.done,
            ollama_response.prompt_eval_count,
            ollama_response.eval_count
        );

        let message = self.convert_response_message(ollama_response.message);

        let response = if ollama_response.prompt_eval_count > 0 || ollama_response.eval_count > 0 {
            let usage = TokenUsage::new(
                ollama_response.prompt_eval_count,
                ollama_response.eval_count,
            );
            CompletionResponse::with_usage(message, usage)
        } else {
            CompletionResponse::new(message)
        };

        Ok(response)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
