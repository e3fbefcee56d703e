use super::support::{mount_models, openrouter_config, registry, sse_body, sse_response};
use futures_util::StreamExt;
use llmrelay::Error;
use llmrelay::llm::{AskOptions, Chunk, Message};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_stream(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(sse_response(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn malformed_event_between_valid_ones_is_skipped() {
    let server = MockServer::start().await;
    mount_models(&server, "/api/v1/models", vec![]).await;
    mount_stream(
        &server,
        sse_body(&[
            r#"{"choices":[{"delta":{"content":"Hel"}}]}"#,
            r#"{"choices":[{"delta":{"content":"#,
            r#"{"choices":[{"delta":{"content":"lo"}}]}"#,
        ]),
    )
    .await;

    let config = openrouter_config(&server, "");
    let (stream, model) = registry(&config)
        .ask_stream(vec![Message::user("hi")], None, &AskOptions::default())
        .await
        .unwrap();
    assert_eq!(model.id, "openai/gpt-4o-mini");

    let chunks: Vec<Chunk> = stream.collect().await;
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["Hel", "lo"]);
    server.verify().await;
}

#[tokio::test]
async fn tool_call_fragments_are_reassembled() {
    let server = MockServer::start().await;
    mount_models(&server, "/api/v1/models", vec![]).await;
    mount_stream(
        &server,
        sse_body(&[
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","type":"function","function":{"name":"weather","arguments":""}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"id":"call_b","type":"function","function":{"name":"time","arguments":"{}"}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"city\":"}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"Oslo\"}"}}]}}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}],"usage":{"prompt_tokens":5,"completion_tokens":7,"total_tokens":12}}"#,
        ]),
    )
    .await;

    let config = openrouter_config(&server, "");
    let (stream, _) = registry(&config)
        .ask_stream(vec![Message::user("weather?")], None, &AskOptions::default())
        .await
        .unwrap();

    let (text, calls) = stream.collect_text().await.unwrap();
    assert!(text.is_empty());
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].id, "call_a");
    assert_eq!(calls[0].function.name, "weather");
    assert_eq!(calls[0].arguments_json().unwrap(), json!({"city": "Oslo"}));
    assert_eq!(calls[1].function.name, "time");
}

#[tokio::test]
async fn error_event_ends_the_stream_with_an_error() {
    let server = MockServer::start().await;
    mount_models(&server, "/api/v1/models", vec![]).await;
    mount_stream(
        &server,
        sse_body(&[
            r#"{"choices":[{"delta":{"content":"partial"}}]}"#,
            r#"{"error":{"code":502,"message":"Upstream overloaded"},"choices":[{"delta":{},"finish_reason":"error"}]}"#,
        ]),
    )
    .await;

    let config = openrouter_config(&server, "");
    let (stream, _) = registry(&config)
        .ask_stream(vec![Message::user("hi")], None, &AskOptions::default())
        .await
        .unwrap();

    let err = stream.collect_text().await.unwrap_err();
    assert_eq!(err.status, 502);
    assert!(err.message.contains("Upstream overloaded"));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn rejected_stream_fails_before_any_chunk() {
    let server = MockServer::start().await;
    mount_models(&server, "/api/v1/models", vec![]).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let config = openrouter_config(&server, "");
    let err = registry(&config)
        .ask_stream(vec![Message::user("hi")], None, &AskOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Ai(ref inner) if inner.status == 503));
}
