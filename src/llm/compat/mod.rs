//! Shared machinery for OpenAI-style chat-completions backends.
//!
//! Concrete providers hold a [`CompatBackend`] and delegate to it wherever
//! their behavior is unmodified.

use super::catalog::{DEFAULT_CATALOG_TTL, ModelCatalog};
use super::http_client::Transport;
use super::model::ModelInfo;
use super::params::ModelParams;
use super::streaming::{ChunkDecoder, ChunkStream, spawn_chunk_producer};
use super::types::{
    Completion, CompletionRequest, Message, PdfEngine, Plugin, ToolDeclaration, UsageOptions,
};
use super::wire::{ChatResponse, ModelListResponse};
use crate::config::ProviderConfig;
use crate::error::{AiError, CODE_EMPTY_RESPONSE};
use reqwest::header::HeaderMap;
use std::borrow::Cow;
use std::time::Duration;

pub const DEFAULT_CHAT_COMPLETIONS_PATH: &str = "chat/completions";
pub const DEFAULT_MODELS_PATH: &str = "models";

#[derive(Debug)]
pub struct CompatBackend {
    transport: Transport,
    catalog: ModelCatalog,
    default_model: String,
    chat_completions_path: String,
    models_path: String,
}

/// Per-backend fallbacks for fields a [`ProviderConfig`] leaves unset.
#[derive(Debug, Clone, Copy)]
pub struct BackendDefaults {
    pub base_url: &'static str,
    pub default_model: &'static str,
    pub extra_headers: &'static [(&'static str, &'static str)],
}

impl CompatBackend {
    pub fn new(transport: Transport, catalog: ModelCatalog, default_model: &str) -> Self {
        Self {
            transport,
            catalog,
            default_model: default_model.to_string(),
            chat_completions_path: DEFAULT_CHAT_COMPLETIONS_PATH.to_string(),
            models_path: DEFAULT_MODELS_PATH.to_string(),
        }
    }

    pub fn from_config(
        config: &ProviderConfig,
        defaults: BackendDefaults,
        timeout_secs: u64,
    ) -> Result<Self, AiError> {
        let base_url = config.base_url.as_deref().unwrap_or(defaults.base_url);
        let transport = Transport::new(&config.name, base_url, config.api_key.as_deref(), timeout_secs)?
            .with_extra_headers(defaults.extra_headers);
        let ttl = config
            .catalog_ttl_secs
            .map_or(DEFAULT_CATALOG_TTL, Duration::from_secs);
        let catalog = ModelCatalog::new(&config.name, config.models.clone(), ttl);
        let default_model = config
            .default_model
            .as_deref()
            .unwrap_or(defaults.default_model);

        let mut backend = Self::new(transport, catalog, default_model);
        if let Some(path) = &config.chat_completions_path {
            backend.chat_completions_path.clone_from(path);
        }
        if let Some(path) = &config.models_path {
            backend.models_path.clone_from(path);
        }
        Ok(backend)
    }

    pub fn name(&self) -> &str {
        self.transport.provider()
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn create_request(
        &self,
        stream: bool,
        messages: Vec<Message>,
        tools: Option<&[ToolDeclaration]>,
        model: &ModelInfo,
        params: &ModelParams,
        web_search: bool,
    ) -> CompletionRequest {
        let mut plugins = Vec::new();
        if web_search {
            plugins.push(Plugin::web());
        }
        if messages.iter().any(Message::has_file) {
            let engine = if model.supports_file_input() {
                PdfEngine::Native
            } else {
                PdfEngine::PdfText
            };
            plugins.push(Plugin::file_parser(engine));
        }

        if tools.is_some_and(|t| !t.is_empty()) && model.rejects_tools() {
            tracing::warn!(
                provider = %self.name(),
                model = %model.id,
                "Model does not list tool support; sending tool declarations anyway"
            );
        }

        CompletionRequest {
            model: model.id.clone(),
            messages,
            tools: tools.map(<[ToolDeclaration]>::to_vec),
            params: params.clone(),
            plugins,
            stream,
            usage: UsageOptions { include: true },
            model_info: model.clone(),
        }
    }

    pub async fn ask(
        &self,
        request: &CompletionRequest,
        headers: &HeaderMap,
    ) -> Result<Completion, AiError> {
        let request = with_stream_flag(request, false);
        let response = self
            .transport
            .post_json(&self.chat_completions_path, &request.model, request.as_ref(), headers)
            .await?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| AiError::network(self.name(), &request.model, err))?;
        let parsed: ChatResponse = serde_json::from_slice(&body)
            .map_err(|err| AiError::decode(self.name(), &request.model, err))?;

        completion_from_response(self.name(), &request, status, parsed)
    }

    /// Resolves once the provider accepted the stream; a non-2xx status or an
    /// unreachable host fails here rather than inside the stream.
    pub async fn ask_stream(
        &self,
        request: &CompletionRequest,
        headers: &HeaderMap,
    ) -> Result<ChunkStream, AiError> {
        let request = with_stream_flag(request, true);
        let response = self
            .transport
            .post_json(&self.chat_completions_path, &request.model, request.as_ref(), headers)
            .await?;
        Ok(spawn_chunk_producer(
            response,
            ChunkDecoder::new(self.name(), &request.model),
        ))
    }

    /// Raw listing from the models endpoint, unfiltered and unsorted.
    pub async fn fetch_models(&self) -> Result<Vec<ModelInfo>, AiError> {
        let listing: ModelListResponse = self.transport.get_json(&self.models_path).await?;
        Ok(listing.data)
    }
}

fn with_stream_flag(request: &CompletionRequest, stream: bool) -> Cow<'_, CompletionRequest> {
    if request.stream == stream {
        Cow::Borrowed(request)
    } else {
        let mut owned = request.clone();
        owned.stream = stream;
        Cow::Owned(owned)
    }
}

/// Turn a 2xx body into a [`Completion`].
///
/// Providers may report failure inside a successful response, so the
/// embedded error object is checked before anything else.
pub fn completion_from_response(
    provider: &str,
    request: &CompletionRequest,
    status: u16,
    response: ChatResponse,
) -> Result<Completion, AiError> {
    if let Some(error) = &response.error {
        return Err(
            AiError::new(provider, &request.model, error.code_string(), error.message.clone())
                .with_status(status),
        );
    }

    let Some(choice) = response.choices.first() else {
        return Err(AiError::new(
            provider,
            &request.model,
            CODE_EMPTY_RESPONSE,
            "response contained no choices",
        )
        .with_status(status));
    };

    let message = &choice.message;
    Ok(Completion {
        content: message.content.clone().unwrap_or_default(),
        reasoning: message.reasoning_text(),
        finish_reason: choice.finish_reason.clone(),
        tool_calls: message.tool_calls.clone().unwrap_or_default(),
        annotations: message.annotations.clone().unwrap_or_default(),
        usage: response.usage.clone(),
        model: request.model_info.clone(),
        response,
    })
}

pub(crate) fn sort_by_id(models: &mut [ModelInfo]) {
    models.sort_by(|a, b| a.id.cmp(&b.id));
}
