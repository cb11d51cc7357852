use async_trait::async_trait;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use stepwise::config::{Config, ToolsConfig};
use stepwise::error::{Result, StepwiseError};
use stepwise::providers::{CompletionResponse, Message, Provider, ToolCall};
use stepwise::storage::SqliteCheckpointStore;
use tempfile::TempDir;

/// Provider replaying scripted assistant messages, recording every request
#[allow(dead_code)]
pub struct ScriptedProvider {
    responses: Vec<Message>,
    fail_at: Option<usize>,
    call_count: Arc<Mutex<usize>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses,
            fail_at: None,
            call_count: Arc::new(Mutex::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail the call with this zero-based index
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

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

        if self.fail_at == Some(index) {
            return Err(StepwiseError::Provider("scripted failure".to_string()).into());
        }

        let message = self
            .responses
            .get(index)
            .cloned()
            .unwrap_or_else(|| Message::assistant("Done"));
        Ok(CompletionResponse::new(message))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[allow(dead_code)]
pub fn weather_call(id: &str, city: &str) -> ToolCall {
    ToolCall::new(
        id,
        "get_weather",
        serde_json::json!({ "city": city }).to_string(),
    )
}

#[allow(dead_code)]
pub fn command_call(id: &str, command: &str) -> ToolCall {
    ToolCall::new(
        id,
        "run_command",
        serde_json::json!({ "command": command }).to_string(),
    )
}

/// Tool configuration with the weather tool pointed at `weather_url`
#[allow(dead_code)]
pub fn tools_config(weather_url: &str) -> ToolsConfig {
    let mut config = ToolsConfig::default();
    config.weather.base_url = weather_url.to_string();
    config.weather.timeout_seconds = 5;
    config
}

#[allow(dead_code)]
pub fn create_temp_store() -> (SqliteCheckpointStore, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("history.db");
    let store = SqliteCheckpointStore::new_with_path(db_path)
        .expect("failed to create sqlite store with path");
    (store, tmp)
}

#[allow(dead_code)]
pub fn temp_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.path = Some(dir.path().join("history.db").to_string_lossy().into_owned());
    config
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
