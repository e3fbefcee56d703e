use super::compat::{BackendDefaults, CompatBackend, sort_by_id};
use super::model::{ModelInfo, Pricing};
use super::params::ModelParams;
use super::streaming::ChunkStream;
use super::traits::{Provider, ProviderFuture};
use super::types::{Completion, CompletionRequest, Message, ToolDeclaration};
use crate::config::ProviderConfig;
use crate::error::AiError;
use reqwest::header::HeaderMap;

/// LM Studio's default server address.
pub const LOCAL_BASE_URL: &str = "http://localhost:1234/v1";

const LOCAL_DEFAULTS: BackendDefaults = BackendDefaults {
    base_url: LOCAL_BASE_URL,
    default_model: "local-model",
    extra_headers: &[],
};

/// A self-hosted OpenAI-compatible server. No key required; everything it
/// lists costs nothing, so every model counts as free.
pub struct LocalProvider {
    backend: CompatBackend,
}

impl LocalProvider {
    pub fn new(backend: CompatBackend) -> Self {
        Self { backend }
    }

    pub fn from_config(config: &ProviderConfig, timeout_secs: u64) -> Result<Self, AiError> {
        CompatBackend::from_config(config, LOCAL_DEFAULTS, timeout_secs).map(Self::new)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, AiError> {
        let mut models = self.backend.fetch_models().await?;
        for model in &mut models {
            model.pricing = Pricing::free();
        }
        sort_by_id(&mut models);
        Ok(models)
    }
}

impl Provider for LocalProvider {
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
        Box::pin(
            self.backend
                .catalog()
                .models(only_free, force_fresh, || self.list_models()),
        )
    }

    fn get_model_info<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, ModelInfo> {
        Box::pin(
            self.backend
                .catalog()
                .model_info(name, || self.list_models()),
        )
    }
}
