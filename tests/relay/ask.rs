use super::support::{completion_body, mount_models, model_entry, openrouter_config, registry};
use llmrelay::Error;
use llmrelay::llm::{AskOptions, Message, ModelParams, ToolDeclaration};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn ask_round_trip_layers_params_and_returns_content() {
    let server = MockServer::start().await;
    mount_models(
        &server,
        "/api/v1/models",
        vec![model_entry("openai/gpt-4o-mini", 100, false)],
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-or-test"))
        .and(body_partial_json(json!({
            "model": "openai/gpt-4o-mini",
            "temperature": 0.9,
            "max_tokens": 64,
            "usage": {"include": true}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Hi there")))
        .expect(1)
        .mount(&server)
        .await;

    let config = openrouter_config(
        &server,
        r"
[params.provider.openrouter]
temperature = 0.2
max_tokens = 64
",
    );
    let options = AskOptions {
        params: ModelParams {
            temperature: Some(0.9),
            ..ModelParams::default()
        },
        ..AskOptions::default()
    };

    let completion = registry(&config)
        .ask(vec![Message::user("hello")], None, &options)
        .await
        .unwrap();

    assert_eq!(completion.content, "Hi there");
    assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
    assert_eq!(completion.model.id, "openai/gpt-4o-mini");
    assert_eq!(completion.usage.unwrap().total_tokens, 12);
    server.verify().await;
}

#[tokio::test]
async fn tools_and_web_search_reach_the_wire() {
    let server = MockServer::start().await;
    mount_models(&server, "/api/v1/models", vec![]).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(body_partial_json(json!({
            "model": "openai/gpt-4o",
            "tools": [{"type": "function", "function": {"name": "weather"}}],
            "plugins": [{"id": "web"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "weather", "arguments": "{\"city\":\"Oslo\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = openrouter_config(&server, "");
    let tools = vec![ToolDeclaration::function(
        "weather",
        "Current weather",
        json!({"type": "object", "properties": {"city": {"type": "string"}}}),
    )];
    let options = AskOptions {
        model_spec: Some("openrouter:openai/gpt-4o".into()),
        web_search: true,
        ..AskOptions::default()
    };

    let completion = registry(&config)
        .ask(vec![Message::user("weather in Oslo?")], Some(tools.as_slice()), &options)
        .await
        .unwrap();

    assert_eq!(completion.tool_calls.len(), 1);
    assert_eq!(completion.tool_calls[0].function.name, "weather");
    assert_eq!(
        completion.tool_calls[0].arguments_json().unwrap(),
        json!({"city": "Oslo"})
    );
    server.verify().await;
}

#[tokio::test]
async fn error_inside_successful_response_is_surfaced() {
    let server = MockServer::start().await;
    mount_models(&server, "/api/v1/models", vec![]).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"code": 429, "message": "Rate limit exceeded upstream"}
        })))
        .mount(&server)
        .await;

    let config = openrouter_config(&server, "");
    let err = registry(&config)
        .ask(vec![Message::user("hi")], None, &AskOptions::default())
        .await
        .unwrap_err();

    let Error::Ai(err) = err else {
        panic!("expected provider error, got {err:?}");
    };
    assert_eq!(err.code, "429");
    assert!(err.message.contains("Rate limit exceeded"));
}

#[tokio::test]
async fn http_failure_carries_status() {
    let server = MockServer::start().await;
    mount_models(&server, "/api/v1/models", vec![]).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": 401, "message": "No auth credentials found"}
        })))
        .mount(&server)
        .await;

    let config = openrouter_config(&server, "");
    let err = registry(&config)
        .ask(vec![Message::user("hi")], None, &AskOptions::default())
        .await
        .unwrap_err();

    let Error::Ai(err) = err else {
        panic!("expected provider error, got {err:?}");
    };
    assert_eq!(err.status, 401);
    assert!(!err.is_retryable());
}
