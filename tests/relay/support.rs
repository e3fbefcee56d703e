use llmrelay::config::Config;
use llmrelay::llm::ProviderRegistry;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// An `openrouter` provider pointed at `server`, plus whatever `extra` adds.
pub fn openrouter_config(server: &MockServer, extra: &str) -> Config {
    let toml = format!(
        r#"
default_model = "openrouter:openai/gpt-4o-mini"

[[providers]]
name = "openrouter"
base_url = "{}/api/v1"
api_key = "sk-or-test"
{extra}
"#,
        server.uri()
    );
    Config::from_toml_str(&toml).unwrap()
}

pub fn registry(config: &Config) -> ProviderRegistry {
    ProviderRegistry::from_config(config).unwrap()
}

pub fn model_entry(id: &str, created: i64, free: bool) -> Value {
    let rate = if free { "0" } else { "0.000002" };
    json!({
        "id": id,
        "created": created,
        "context_length": 128_000,
        "pricing": {"prompt": rate, "completion": rate, "request": "0", "image": "0"}
    })
}

pub async fn mount_models(server: &MockServer, route: &str, entries: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": entries})))
        .mount(server)
        .await;
}

pub fn completion_body(content: &str) -> Value {
    json!({
        "id": "gen-1",
        "model": "openai/gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
    })
}

/// `data:` framing for each event, terminated by `[DONE]`.
pub fn sse_body(events: &[&str]) -> String {
    let mut body = String::new();
    for event in events {
        body.push_str("data: ");
        body.push_str(event);
        body.push_str("\n\n");
    }
    body.push_str("data: [DONE]\n\n");
    body
}

pub fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}
