use super::support::{completion_body, mount_models};
use llmrelay::Config;
use llmrelay::llm::{AskOptions, Message, ProviderRegistry};
use serde_json::json;
use std::fs;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn config_file_drives_a_full_call() {
    let server = MockServer::start().await;
    mount_models(&server, "/v1/models", vec![]).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": "mistral-7b", "top_p": 0.5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        format!(
            r#"
default_model = "box:mistral-7b"
request_timeout_secs = 5

[[providers]]
name = "box"
kind = "local"
base_url = "{}/v1"

[params.provider.box]
top_p = 0.5
"#,
            server.uri()
        ),
    )
    .unwrap();

    let config = Config::load(Some(config_path.to_str().unwrap())).unwrap();
    assert_eq!(config.config_path, config_path);
    assert_eq!(config.request_timeout_secs, 5);

    let completion = ProviderRegistry::from_config(&config)
        .unwrap()
        .ask(vec![Message::user("ping")], None, &AskOptions::default())
        .await
        .unwrap();
    assert_eq!(completion.content, "ok");
    server.verify().await;
}

#[test]
fn invalid_config_file_is_rejected_with_context() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("broken.toml");
    fs::write(
        &config_path,
        r#"
default_model = "missing:model"

[[providers]]
name = "box"
kind = "local"
"#,
    )
    .unwrap();

    let err = Config::load(Some(config_path.to_str().unwrap())).unwrap_err();
    assert!(format!("{err:#}").contains("unknown provider missing"));
}

#[test]
fn missing_explicit_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let err = Config::load(Some(missing.to_str().unwrap())).unwrap_err();
    assert!(format!("{err:#}").contains("nope.toml"));
}
