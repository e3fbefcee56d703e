use super::support::{model_entry, openrouter_config, registry};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_listing(server: &MockServer, expected_fetches: u64) {
    Mock::given(method("GET"))
        .and(path("/api/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                model_entry("meta/llama-free", 200, true),
                model_entry("openai/gpt-4o-mini", 100, false),
            ]
        })))
        .expect(expected_fetches)
        .mount(server)
        .await;
}

#[tokio::test]
async fn catalog_within_ttl_is_fetched_once() {
    let server = MockServer::start().await;
    mount_listing(&server, 1).await;

    let registry = registry(&openrouter_config(&server, ""));
    let all = registry.models(Some("openrouter"), false, false).await.unwrap();
    let free = registry.models(Some("openrouter"), true, false).await.unwrap();
    let info = registry
        .resolve_model(Some("openrouter:openai/gpt-4o-mini"), 0)
        .await
        .unwrap();

    assert_eq!(all.len(), 2);
    assert_eq!(free.len(), 1);
    assert_eq!(free[0].id, "meta/llama-free");
    assert_eq!(info.model.context_length, Some(128_000));
    server.verify().await;
}

#[tokio::test]
async fn zero_ttl_refetches_every_time() {
    let server = MockServer::start().await;
    mount_listing(&server, 2).await;

    let registry = registry(&openrouter_config(&server, "catalog_ttl_secs = 0"));
    registry.models(None, false, false).await.unwrap();
    registry.models(None, false, false).await.unwrap();
    server.verify().await;
}

#[tokio::test]
async fn force_fresh_bypasses_the_cache() {
    let server = MockServer::start().await;
    mount_listing(&server, 2).await;

    let registry = registry(&openrouter_config(&server, ""));
    registry.models(None, false, false).await.unwrap();
    registry.models(None, false, true).await.unwrap();
    server.verify().await;
}

#[tokio::test]
async fn warm_up_counts_reachable_providers() {
    let server = MockServer::start().await;
    mount_listing(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let extra = format!(
        r#"
[[providers]]
name = "local"
base_url = "{}/v1"
"#,
        server.uri()
    );
    let registry = registry(&openrouter_config(&server, &extra));
    assert_eq!(registry.warm_up().await, 1);

    // Already cached; no second fetch.
    registry.models(Some("openrouter"), false, false).await.unwrap();
    server.verify().await;
}
