//! OpenAI-compatible chat completions provider
//!
//! Defaults to Groq's hosted endpoint, but any service speaking the
//! `POST {api_base}/chat/completions` protocol with bearer authentication
//! works by changing `provider.groq.api_base`.

use crate::config::GroqConfig;
use crate::error::{Result, StepwiseError};
use crate::providers::{
    validate_message_sequence, CompletionResponse, Message, Provider, TokenUsage, ToolCall,
};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat completions provider for Groq and other OpenAI-compatible services
///
/// The API key is read from the environment variable named by
/// `GroqConfig::api_key_env` on every request, so construction never fails
/// for lack of credentials.
pub struct GroqProvider {
    client: Client,
    config: GroqConfig,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ChatTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatTool {
    r#type: &'static str,
    function: ChatFunction,
}

#[derive(Debug, Serialize)]
struct ChatFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatToolCall {
    id: String,
    #[serde(default = "default_tool_type")]
    r#type: String,
    function: ChatFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn default_tool_type() -> String {
    "function".to_string()
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

impl GroqProvider {
    /// Create a new provider instance
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    ///
    /// # Examples
    ///
    /// ```
    /// use stepwise::config::GroqConfig;
    /// use stepwise::providers::{GroqProvider, Provider};
    ///
    /// let provider = GroqProvider::new(GroqConfig::default()).unwrap();
    /// assert_eq!(provider.model_name(), "llama-3.3-70b-versatile");
    /// ```
    pub fn new(config: GroqConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("stepwise/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StepwiseError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Groq provider: api_base={}, model={}",
            config.api_base,
            config.model
        );

        Ok(Self { client, config })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'))
    }

    fn api_key(&self) -> Result<String> {
        match std::env::var(&self.config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(StepwiseError::MissingCredentials(format!(
                "groq (set {})",
                self.config.api_key_env
            ))
            .into()),
        }
    }

    fn convert_messages(&self, messages: &[Message]) -> Vec<ChatMessage> {
        validate_message_sequence(messages)
            .into_iter()
            .map(|m| ChatMessage {
                role: m.role.to_string(),
                content: m.content,
                tool_calls: m.tool_calls.map(|calls| {
                    calls
                        .into_iter()
                        .map(|tc| ChatToolCall {
                            id: tc.id,
                            r#type: default_tool_type(),
                            function: ChatFunctionCall {
                                name: tc.function.name,
                                arguments: tc.function.arguments,
                            },
                        })
                        .collect()
                }),
                tool_call_id: m.tool_call_id,
            })
            .collect()
    }

    fn convert_tools(&self, tools: &[serde_json::Value]) -> Vec<ChatTool> {
        tools
            .iter()
            .filter_map(|t| {
                let obj = t.as_object()?;
                Some(ChatTool {
                    r#type: "function",
                    function: ChatFunction {
                        name: obj.get("name")?.as_str()?.to_string(),
                        description: obj.get("description")?.as_str()?.to_string(),
                        parameters: obj.get("parameters")?.clone(),
                    },
                })
            })
            .collect()
    }

    fn convert_response_message(&self, chat_msg: ChatMessage) -> Message {
        match chat_msg.tool_calls {
            Some(tool_calls) if !tool_calls.is_empty() => {
                let converted = tool_calls
                    .into_iter()
                    .map(|tc| ToolCall::new(tc.id, tc.function.name, tc.function.arguments))
                    .collect();
                let mut message = Message::assistant_with_tools(converted);
                message.content = chat_msg.content.filter(|c| !c.is_empty());
                message
            }
            _ => Message::assistant(chat_msg.content.unwrap_or_default()),
        }
    }
}

#[async_trait]
impl Provider for GroqProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<CompletionResponse> {
        let api_key = self.api_key()?;
        let tools = self.convert_tools(tools);

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: self.convert_messages(messages),
            tool_choice: (!tools.is_empty()).then_some("auto"),
            tools,
            temperature: self.config.temperature,
            stream: false,
        };

        tracing::debug!(
            "Sending chat completion request: {} messages, {} tools",
            request.messages.len(),
            request.tools.len()
        );

        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Chat completion request failed: {}", e);
                StepwiseError::Provider(format!("Chat completion request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Model service returned error {}: {}", status, error_text);
            return Err(StepwiseError::Provider(format!(
                "Model service returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse chat completion response: {}", e);
            StepwiseError::Provider(format!("Failed to parse chat completion response: {}", e))
        })?;

        let choice = chat_response.choices.into_iter().next().ok_or_else(|| {
            StepwiseError::Provider("No choices in chat completion response".to_string())
        })?;

        let message = self.convert_response_message(choice.message);
        let usage = chat_response
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens));

        Ok(match usage {
            Some(u) => CompletionResponse::with_usage(message, u),
            None => CompletionResponse::new(message),
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
