use super::support::{model_entry, mount_models, openrouter_config, registry};
use llmrelay::Error;
use llmrelay::llm::{MemoryChatSettings, NO_CHAT};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// openrouter plus a local server, with one pinned alias on openrouter.
async fn two_providers(server: &MockServer) -> llmrelay::Config {
    mount_models(
        server,
        "/api/v1/models",
        vec![
            model_entry("openai/gpt-4o-mini", 300, false),
            model_entry("anthropic/claude-3.5-haiku", 200, false),
        ],
    )
    .await;
    mount_models(server, "/v1/models", vec![model_entry("qwen2.5-7b", 0, false)]).await;

    let extra = format!(
        r#"
[[providers.models]]
id = "anthropic/claude-3.5-haiku"
alias = "haiku"
context_length = 200000

[[providers]]
name = "lab"
kind = "local"
base_url = "{}/v1"
"#,
        server.uri()
    );
    openrouter_config(server, &extra)
}

#[tokio::test]
async fn explicit_spec_beats_chat_and_default() {
    let server = MockServer::start().await;
    let config = two_providers(&server).await;
    let registry = registry(&config).with_chat_settings(Arc::new(MemoryChatSettings::new()));
    registry.set_chat_model(7, "lab:qwen2.5-7b").await.unwrap();

    let explicit = registry
        .resolve_model(Some("openrouter:anthropic/claude-3.5-haiku"), 7)
        .await
        .unwrap();
    assert_eq!(explicit.provider.name(), "openrouter");
    assert_eq!(explicit.model.id, "anthropic/claude-3.5-haiku");

    let chat = registry.resolve_model(None, 7).await.unwrap();
    assert_eq!(chat.provider.name(), "lab");
    assert_eq!(chat.model.id, "qwen2.5-7b");
    assert!(chat.model.is_free());

    let default = registry.resolve_model(None, NO_CHAT).await.unwrap();
    assert_eq!(default.provider.name(), "openrouter");
    assert_eq!(default.model.id, "openai/gpt-4o-mini");
}

#[tokio::test]
async fn pinned_entry_wins_over_live_listing() {
    let server = MockServer::start().await;
    let config = two_providers(&server).await;
    let resolved = registry(&config)
        .resolve_model(Some("openrouter:anthropic/claude-3.5-haiku"), NO_CHAT)
        .await
        .unwrap();
    assert_eq!(resolved.model.context_length, Some(200_000));
    assert_eq!(resolved.model.alias.as_deref(), Some("haiku"));
}

#[tokio::test]
async fn unknown_model_resolves_to_placeholder() {
    let server = MockServer::start().await;
    let config = two_providers(&server).await;
    let resolved = registry(&config)
        .resolve_model(Some("lab:not-loaded"), NO_CHAT)
        .await
        .unwrap();
    assert_eq!(resolved.provider.name(), "lab");
    assert_eq!(resolved.model.id, "not-loaded");
    assert_eq!(resolved.model.context_length, None);
}

#[tokio::test]
async fn bad_specs_are_rejected() {
    let server = MockServer::start().await;
    let config = two_providers(&server).await;
    let registry = registry(&config);

    let err = registry.resolve_model(Some("no-colon"), NO_CHAT).await.unwrap_err();
    assert!(matches!(err, Error::InvalidModelSpec(_)));

    let err = registry
        .resolve_model(Some("nowhere:model"), NO_CHAT)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownProvider(ref name) if name == "nowhere"));
}

#[tokio::test]
async fn formatted_model_follows_alias_then_probe_order() {
    let server = MockServer::start().await;
    let config = two_providers(&server).await;
    let registry = registry(&config);

    let aliased = registry.get_formatted_model("haiku", None).await.unwrap();
    assert_eq!(aliased.to_string(), "openrouter:anthropic/claude-3.5-haiku");

    let probed = registry.get_formatted_model("qwen2.5-7b", None).await.unwrap();
    assert_eq!(probed.provider, "lab");

    let prefixed = registry
        .get_formatted_model("lab:qwen2.5-7b", None)
        .await
        .unwrap();
    assert_eq!(prefixed.model.id, "qwen2.5-7b");

    let err = registry.get_formatted_model("ghost", None).await.unwrap_err();
    assert!(matches!(err, Error::ModelNotFound { ref model } if model == "ghost"));
}

#[tokio::test]
async fn random_free_model_comes_from_the_free_view() {
    let server = MockServer::start().await;
    mount_models(
        &server,
        "/api/v1/models",
        vec![
            model_entry("paid/one", 300, false),
            model_entry("free/one", 200, true),
        ],
    )
    .await;
    let config = openrouter_config(&server, "");
    let spec = registry(&config)
        .random_free_model(Some("openrouter"))
        .await
        .unwrap();
    assert_eq!(spec.to_string(), "openrouter:free/one");
}

#[tokio::test]
async fn pinned_chat_provider_outage_is_not_rerouted() {
    let server = MockServer::start().await;
    mount_models(
        &server,
        "/api/v1/models",
        vec![model_entry("openai/gpt-4o-mini", 300, false)],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(503).set_body_string("local server overloaded"))
        .mount(&server)
        .await;

    let extra = format!(
        r#"
[[providers]]
name = "lab"
kind = "local"
base_url = "{}/v1"
"#,
        server.uri()
    );
    let config = openrouter_config(&server, &extra);
    let registry = registry(&config).with_chat_settings(Arc::new(MemoryChatSettings::new()));
    registry.set_chat_model(7, "lab:qwen2.5-7b").await.unwrap();

    let err = registry.resolve_model(None, 7).await.unwrap_err();
    let Error::Ai(err) = err else {
        panic!("expected provider error, got {err:?}");
    };
    assert_eq!(err.provider, "lab");
    assert_eq!(err.status, 503);
    assert!(err.is_retryable());

    let err = registry
        .resolve_model(Some("lab:qwen2.5-7b"), NO_CHAT)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Ai(ref inner) if inner.status == 503));
}
