use super::redact::{sanitize_error_body, truncate_large_fields};
use super::wire::ChatResponse;
use crate::error::AiError;
use reqwest::header::HeaderMap;
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// Longest string logged verbatim from an outgoing body.
const LOGGED_FIELD_CHARS: usize = 256;

pub fn build_provider_client_with_timeout(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Thin HTTP wrapper shared by every backend: bearer auth, base-URL
/// resolution, request logging and status-to-[`AiError`] mapping.
#[derive(Debug, Clone)]
pub struct Transport {
    provider: String,
    base_url: Url,
    /// Pre-computed `"Bearer <key>"` header value.
    cached_auth_header: Option<String>,
    extra_headers: Vec<(&'static str, &'static str)>,
    client: Client,
}

impl Transport {
    pub fn new(
        provider: &str,
        base_url: &str,
        api_key: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, AiError> {
        // A trailing slash makes relative joins append instead of replace.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|err| {
            AiError::new(provider, "", "invalid_base_url", format!("{base_url}: {err}"))
                .with_source(err)
        })?;

        Ok(Self {
            provider: provider.to_string(),
            base_url,
            cached_auth_header: api_key
                .filter(|key| !key.is_empty())
                .map(|key| format!("Bearer {key}")),
            extra_headers: Vec::new(),
            client: build_provider_client_with_timeout(timeout_secs),
        })
    }

    #[must_use]
    pub fn with_extra_headers(mut self, headers: &[(&'static str, &'static str)]) -> Self {
        self.extra_headers.extend_from_slice(headers);
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn has_credentials(&self) -> bool {
        self.cached_auth_header.is_some()
    }

    /// Resolve `path` against the base URL. Absolute URLs pass through.
    pub fn endpoint(&self, path: &str) -> Result<Url, AiError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Url::parse(path).map_err(|err| {
                AiError::new(&self.provider, "", "invalid_endpoint", format!("{path}: {err}"))
            });
        }
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| {
                AiError::new(&self.provider, "", "invalid_endpoint", format!("{path}: {err}"))
            })
    }

    fn request(&self, builder: reqwest::RequestBuilder, headers: &HeaderMap) -> reqwest::RequestBuilder {
        let mut builder = builder;
        if let Some(auth) = &self.cached_auth_header {
            builder = builder.header("Authorization", auth);
        }
        for (name, value) in &self.extra_headers {
            builder = builder.header(*name, *value);
        }
        builder.headers(headers.clone())
    }

    /// POST a JSON body. Non-2xx statuses come back as classified errors.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        model: &str,
        body: &B,
        headers: &HeaderMap,
    ) -> Result<Response, AiError> {
        let url = self.endpoint(path)?;
        self.log_outgoing(&url, body);

        let response = self
            .request(self.client.post(url), headers)
            .json(body)
            .send()
            .await
            .map_err(|err| AiError::network(&self.provider, model, err))?;

        self.check_status(response, model).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AiError> {
        let url = self.endpoint(path)?;
        tracing::debug!(provider = %self.provider, %url, "GET");

        let response = self
            .request(self.client.get(url), &HeaderMap::new())
            .send()
            .await
            .map_err(|err| AiError::network(&self.provider, "", err))?;
        let response = self.check_status(response, "").await?;

        response
            .json()
            .await
            .map_err(|err| AiError::decode(&self.provider, "", err))
    }

    async fn check_status(&self, response: Response, model: &str) -> Result<Response, AiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
        Err(self.status_error(status.as_u16(), model, &body))
    }

    /// Build the error for a non-2xx body, preferring its embedded error object.
    pub fn status_error(&self, status: u16, model: &str, body: &str) -> AiError {
        let embedded = serde_json::from_str::<ChatResponse>(body)
            .ok()
            .and_then(|parsed| parsed.error);

        match embedded {
            Some(error) if !error.message.is_empty() => AiError::new(
                &self.provider,
                model,
                error.code_string(),
                sanitize_error_body(&error.message),
            )
            .with_status(status),
            _ => AiError::new(&self.provider, model, "", sanitize_error_body(body))
                .with_status(status),
        }
    }

    fn log_outgoing<B: Serialize + ?Sized>(&self, url: &Url, body: &B) {
        if !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }
        match serde_json::to_value(body) {
            Ok(mut value) => {
                truncate_large_fields(&mut value, LOGGED_FIELD_CHARS);
                tracing::debug!(provider = %self.provider, %url, body = %value, "POST");
            }
            Err(err) => {
                tracing::debug!(provider = %self.provider, %url, "POST (body not loggable: {err})");
            }
        }
    }
}
