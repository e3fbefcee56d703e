use super::model::ModelInfo;
use super::params::ModelParams;
use super::streaming::ChunkStream;
use super::types::{Completion, CompletionRequest, Message, ToolDeclaration};
use crate::error::AiError;
use reqwest::header::HeaderMap;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`Provider`] methods.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AiError>> + Send + 'a>>;

/// A chat-completion backend.
///
/// Every backend speaks the same request/response model; they differ only in
/// endpoints, listing quirks and sort order. Calls are cancelled by dropping
/// the returned future; streams by dropping or cancelling the [`ChunkStream`].
pub trait Provider: Send + Sync {
    /// Registry key, e.g. `"openrouter"`.
    fn name(&self) -> &str;

    fn default_model(&self) -> &str;

    /// Assemble the wire payload.
    ///
    /// `tools: None` omits the field entirely, `Some(&[])` sends an empty
    /// array. A `web` plugin is attached on `web_search`, a `file-parser`
    /// plugin whenever a message carries a file.
    fn create_request(
        &self,
        stream: bool,
        messages: Vec<Message>,
        tools: Option<&[ToolDeclaration]>,
        model: &ModelInfo,
        params: &ModelParams,
        web_search: bool,
    ) -> CompletionRequest;

    /// One blocking round trip.
    fn ask<'a>(
        &'a self,
        request: &'a CompletionRequest,
        headers: &'a HeaderMap,
    ) -> ProviderFuture<'a, Completion>;

    /// Open a streamed response. Resolves once the handshake succeeded;
    /// decoding continues on a spawned task.
    fn ask_stream<'a>(
        &'a self,
        request: &'a CompletionRequest,
        headers: &'a HeaderMap,
    ) -> ProviderFuture<'a, ChunkStream>;

    fn get_models(&self, only_free: bool, force_fresh: bool)
    -> ProviderFuture<'_, Vec<ModelInfo>>;

    /// Lookup by id or alias. Not-found is an [`AiError`] whose
    /// [`is_model_not_found`](AiError::is_model_not_found) holds.
    fn get_model_info<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, ModelInfo>;

    /// Uniformly sample a free model id.
    fn random_free_model(&self) -> ProviderFuture<'_, String> {
        let name = self.name().to_string();
        Box::pin(async move { Err(AiError::unsupported(&name, "random free model selection")) })
    }
}
