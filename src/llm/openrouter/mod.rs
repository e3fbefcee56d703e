use super::compat::{BackendDefaults, CompatBackend};
use super::model::ModelInfo;
use super::params::ModelParams;
use super::streaming::ChunkStream;
use super::traits::{Provider, ProviderFuture};
use super::types::{Completion, CompletionRequest, Message, ToolDeclaration};
use crate::config::ProviderConfig;
use crate::error::{AiError, CODE_MODEL_NOT_FOUND};
use rand::seq::IndexedRandom;
use reqwest::header::HeaderMap;

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

const OPENROUTER_EXTRA_HEADERS: [(&str, &str); 2] = [
    ("HTTP-Referer", "https://github.com/llmrelay/llmrelay"),
    ("X-Title", "llmrelay"),
];

const OPENROUTER_DEFAULTS: BackendDefaults = BackendDefaults {
    base_url: OPENROUTER_BASE_URL,
    default_model: "openai/gpt-4o-mini",
    extra_headers: &OPENROUTER_EXTRA_HEADERS,
};

pub struct OpenRouterProvider {
    backend: CompatBackend,
    /// Listings are narrowed to free models and paid lookups are refused.
    only_free_models: bool,
}

impl OpenRouterProvider {
    pub fn new(backend: CompatBackend, only_free_models: bool) -> Self {
        Self {
            backend,
            only_free_models,
        }
    }

    pub fn from_config(config: &ProviderConfig, timeout_secs: u64) -> Result<Self, AiError> {
        CompatBackend::from_config(config, OPENROUTER_DEFAULTS, timeout_secs)
            .map(|backend| Self::new(backend, config.only_free_models))
    }

    /// Newest first; ties broken by id so the order is stable.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, AiError> {
        let mut models = self.backend.fetch_models().await?;
        models.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| a.id.cmp(&b.id)));
        Ok(models)
    }
}

impl Provider for OpenRouterProvider {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn default_model(&self) -> &str {
        self.backend.default_model()
    }

    fn create_request(
        &self,
        stream: bool,
        messages: Vec<Message>,
        tools: Option<&[ToolDeclaration]>,
        model: &ModelInfo,
        params: &ModelParams,
        web_search: bool,
    ) -> CompletionRequest {
        self.backend
            .create_request(stream, messages, tools, model, params, web_search)
    }

    fn ask<'a>(
        &'a self,
        request: &'a CompletionRequest,
        headers: &'a HeaderMap,
    ) -> ProviderFuture<'a, Completion> {
        Box::pin(self.backend.ask(request, headers))
    }

    fn ask_stream<'a>(
        &'a self,
        request: &'a CompletionRequest,
        headers: &'a HeaderMap,
    ) -> ProviderFuture<'a, ChunkStream> {
        Box::pin(self.backend.ask_stream(request, headers))
    }

    fn get_models(&self, only_free: bool, force_fresh: bool) -> ProviderFuture<'_, Vec<ModelInfo>> {
        let only_free = only_free || self.only_free_models;
        Box::pin(
            self.backend
                .catalog()
                .models(only_free, force_fresh, || self.list_models()),
        )
    }

    fn get_model_info<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, ModelInfo> {
        Box::pin(async move {
            let model = self
                .backend
                .catalog()
                .model_info(name, || self.list_models())
                .await?;
            if self.only_free_models && !model.is_free() {
                return Err(AiError::model_not_free(self.name(), &model.id));
            }
            Ok(model)
        })
    }

    fn random_free_model(&self) -> ProviderFuture<'_, String> {
        Box::pin(async move {
            let free = self.get_models(true, false).await?;
            free.choose(&mut rand::rng())
                .map(|model| model.id.clone())
                .ok_or_else(|| {
                    AiError::new(self.name(), "", CODE_MODEL_NOT_FOUND, "no free models available")
                })
        })
    }
}
