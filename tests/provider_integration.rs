mod common;

use common::tools_config;
use serial_test::serial;
use std::sync::Arc;
use stepwise::agent::{Agent, Session};
use stepwise::config::{AgentConfig, ProviderConfig};
use stepwise::providers::create_provider;
use stepwise::tools::Toolbox;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY_ENV: &str = "STEPWISE_IT_GROQ_KEY";

fn groq_config(api_base: &str) -> ProviderConfig {
    let mut config = stepwise::Config::default().provider;
    config.provider_type = "groq".to_string();
    config.groq.api_base = api_base.to_string();
    config.groq.api_key_env = KEY_ENV.to_string();
    config
}

#[tokio::test]
#[serial]
async fn test_groq_weather_round_trip() {
    std::env::set_var(KEY_ENV, "test-key");

    let weather = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Paris"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Sunny +18°C"))
        .expect(1)
        .mount(&weather)
        .await;

    let model = MockServer::start().await;
    // Answer once the observation is part of the request
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("The weather in Paris is Sunny +18°C."))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{
                "message": {"role": "assistant", "content": "Sunny and 18°C in Paris."}
            }],
            "usage": {"prompt_tokens": 40, "completion_tokens": 8}
        })))
        .with_priority(1)
        .mount(&model)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"city\":\"Paris\"}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 30, "completion_tokens": 5}
        })))
        .with_priority(2)
        .mount(&model)
        .await;

    let provider = create_provider("groq", &groq_config(&model.uri())).unwrap();
    let toolbox = Toolbox::from_config(&tools_config(&weather.uri())).unwrap();
    let agent = Agent::new(Arc::from(provider), toolbox, &AgentConfig::default()).unwrap();
    let mut session = Session::new();

    let outcome = agent
        .run_turn(&mut session, "What's the weather in Paris?")
        .await
        .unwrap();

    std::env::remove_var(KEY_ENV);

    assert_eq!(outcome.answer, "Sunny and 18°C in Paris.");
    assert_eq!(outcome.planner_calls, 2);
    assert_eq!(outcome.usage.total_tokens, 83);
    assert_eq!(session.conversation.len(), 4);

    // The system prompt and tool schemas went out with each request
    let requests = model.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let first: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(first["messages"][0]["role"], "system");
    assert_eq!(first["tools"][0]["function"]["name"], "get_weather");
    assert_eq!(first["model"], "llama-3.3-70b-versatile");
}

#[tokio::test]
#[serial]
async fn test_groq_error_status_fails_turn() {
    std::env::set_var(KEY_ENV, "test-key");

    let model = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&model)
        .await;

    let provider = create_provider("groq", &groq_config(&model.uri())).unwrap();
    let agent = Agent::new(Arc::from(provider), Toolbox::empty(), &AgentConfig::default()).unwrap();
    let mut session = Session::new();

    let err = agent.run_turn(&mut session, "hi").await.unwrap_err();
    std::env::remove_var(KEY_ENV);

    assert!(err.to_string().contains("429"));
    assert!(session.conversation.is_empty());
}
