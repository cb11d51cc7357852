//! Weather lookup tool
//!
//! Fetches a one-line condition summary from a wttr.in-compatible service:
//! `GET {base_url}/{city}?format=%C+%t`.

use crate::config::WeatherConfig;
use crate::error::{Result, StepwiseError};
use crate::tools::{ToolExecutor, ToolResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Name the model uses to request a weather lookup
pub const TOOL_NAME: &str = "get_weather";

/// Observation returned for any unsuccessful lookup
pub const WEATHER_FAILURE: &str = "Something went wrong";

/// Condition and temperature, e.g. `Partly cloudy +12°C`
const WEATHER_QUERY: &str = "format=%C+%t";

/// Arguments for `get_weather`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WeatherArgs {
    /// City name as typed by the model
    pub city: String,
}

/// Weather lookup over HTTP
pub struct WeatherTool {
    client: Client,
    base_url: Url,
}

impl WeatherTool {
    /// Create the tool from configuration
    ///
    /// # Errors
    ///
    /// Returns `StepwiseError::Config` if the base URL cannot hold path
    /// segments, or `StepwiseError::Tool` if the HTTP client cannot be built
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            StepwiseError::Config(format!(
                "Invalid weather base_url '{}': {}",
                config.base_url, e
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(StepwiseError::Config(format!(
                "Weather base_url '{}' cannot hold a path",
                config.base_url
            ))
            .into());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("stepwise/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StepwiseError::Tool(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// URL for a city, with the city percent-encoded as one path segment
    ///
    /// # Examples
    ///
    /// ```
    /// use stepwise::config::WeatherConfig;
    /// use stepwise::tools::WeatherTool;
    ///
    /// let tool = WeatherTool::new(&WeatherConfig::default()).unwrap();
    /// assert_eq!(
    ///     tool.request_url("New York").as_str(),
    ///     "http://wttr.in/New%20York?format=%C+%t"
    /// );
    /// ```
    pub fn request_url(&self, city: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(city);
        }
        url.set_query(Some(WEATHER_QUERY));
        url
    }
}

#[async_trait]
impl ToolExecutor for WeatherTool {
    type Args = WeatherArgs;
    const NAME: &'static str = TOOL_NAME;

    fn tool_definition(&self) -> serde_json::Value {
        serde_json::json!({
            "name": TOOL_NAME,
            "description": "Takes a city name as an input and returns the current weather for the city.",
            "parameters": {
                "type": "object",
                "properties": {
                    "city": {
                        "type": "string",
                        "description": "Name of the city"
                    }
                },
                "required": ["city"]
            }
        })
    }

    async fn execute(&self, args: WeatherArgs) -> Result<ToolResult> {
        let url = self.request_url(&args.city);
        tracing::debug!(%url, "Fetching weather");

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(city = %args.city, "Weather request failed: {}", e);
                return Ok(ToolResult::success(WEATHER_FAILURE).with_metadata("error", e.to_string()));
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(city = %args.city, %status, "Weather service returned non-200 status");
            return Ok(ToolResult::success(WEATHER_FAILURE)
                .with_metadata("status", status.as_u16().to_string()));
        }

        match response.text().await {
            Ok(body) => Ok(
                ToolResult::success(format!("The weather in {} is {}.", args.city, body))
                    .with_metadata("status", "200"),
            ),
            Err(e) => {
                tracing::warn!(city = %args.city, "Failed to read weather body: {}", e);
                Ok(ToolResult::success(WEATHER_FAILURE).with_metadata("error", e.to_string()))
            }
        }
    }
}
