//! Test utilities for Stepwise
//!
//! Scripted model provider, temporary directories and assertion helpers.

use crate::config::Config;
use crate::error::{Result, StepwiseError};
use crate::providers::{CompletionResponse, Message, Provider, TokenUsage};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Provider that replays a fixed list of assistant messages
///
/// Once the script runs out every call answers `Done`. Each request is
/// recorded so tests can inspect what the model would have seen.
pub struct ScriptedProvider {
    responses: Vec<Message>,
    failure: Option<String>,
    usage: Option<TokenUsage>,
    call_count: Arc<Mutex<usize>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl ScriptedProvider {
    /// Replay `responses` in order
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses,
            failure: None,
            usage: None,
            call_count: Arc::new(Mutex::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail every call with a provider error
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(Vec::new())
        }
    }

    /// Report `usage` with every response
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Number of completed or failed calls
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Messages sent on each call, oldest first
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(
        &self,
        messages: &[Message],
        _tools: &[serde_json::Value],
    ) -> Result<CompletionResponse> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let mut count = self.call_count.lock().unwrap();
        let index = *count;
        *count += 1;

        if let Some(message) = &self.failure {
            return Err(StepwiseError::Provider(message.clone()).into());
        }

        let message = self
            .responses
            .get(index)
            .cloned()
            .unwrap_or_else(|| Message::assistant("Done"));
        Ok(match self.usage {
            Some(usage) => CompletionResponse::with_usage(message, usage),
            None => CompletionResponse::new(message),
        })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Create a temporary directory for testing
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T>(result: Result<T>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = e.to_string();
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// Configuration pointing at a throwaway history database
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.path = Some(dir.path().join("history.db").to_string_lossy().into_owned());
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_provider_replays_then_finishes() {
        let provider = ScriptedProvider::new(vec![Message::assistant("one")]);
        let first = provider.complete(&[Message::user("a")], &[]).await.unwrap();
        let second = provider.complete(&[Message::user("b")], &[]).await.unwrap();

        assert_eq!(first.message.text(), "one");
        assert_eq!(second.message.text(), "Done");
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.requests()[1][0].text(), "b");
    }

    #[tokio::test]
    async fn test_failing_provider() {
        let provider = ScriptedProvider::failing("boom");
        assert_error_contains(provider.complete(&[], &[]).await, "boom");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        assert_error_contains(Ok(()), "error");
    }

    #[test]
    fn test_test_config_uses_temp_db() {
        let dir = temp_dir();
        let config = test_config(&dir);
        assert!(config.storage.path.unwrap().ends_with("history.db"));
        assert!(Config::default().validate().is_ok());
    }
}
