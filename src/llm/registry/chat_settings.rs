use crate::llm::params::ModelParams;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{PoisonError, RwLock};

pub type ChatId = i64;

pub type SettingsFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// Per-chat persisted state the registry reads and writes.
///
/// Storage is up to the implementor; the registry only needs the current
/// model spec for a chat and its stored parameter overrides.
pub trait ChatSettings: Send + Sync {
    /// The raw spec string stored for `chat_id`, if any.
    fn model_spec(&self, chat_id: ChatId) -> SettingsFuture<'_, Option<String>>;

    fn set_model_spec<'a>(&'a self, chat_id: ChatId, spec: &'a str) -> SettingsFuture<'a, ()>;

    /// Stored parameters for this chat and prompt, with `overrides` merged on
    /// top. `provider` and `alias` let implementors key storage further.
    fn merged_params<'a>(
        &'a self,
        chat_id: ChatId,
        provider: &'a str,
        alias: Option<&'a str>,
        prompt: Option<&'a str>,
        overrides: &'a ModelParams,
    ) -> SettingsFuture<'a, ModelParams>;
}

#[derive(Debug, Default)]
struct MemoryState {
    specs: HashMap<ChatId, String>,
    chat_params: HashMap<ChatId, ModelParams>,
    prompt_params: HashMap<(ChatId, String), ModelParams>,
}

/// [`ChatSettings`] kept in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryChatSettings {
    state: RwLock<MemoryState>,
}

impl MemoryChatSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_chat_params(&self, chat_id: ChatId, params: ModelParams) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.chat_params.insert(chat_id, params);
    }

    pub fn set_prompt_params(&self, chat_id: ChatId, prompt: &str, params: ModelParams) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.prompt_params.insert((chat_id, prompt.to_string()), params);
    }
}

impl ChatSettings for MemoryChatSettings {
    fn model_spec(&self, chat_id: ChatId) -> SettingsFuture<'_, Option<String>> {
        let spec = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .specs
            .get(&chat_id)
            .cloned();
        Box::pin(async move { Ok(spec) })
    }

    fn set_model_spec<'a>(&'a self, chat_id: ChatId, spec: &'a str) -> SettingsFuture<'a, ()> {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .specs
            .insert(chat_id, spec.to_string());
        Box::pin(async { Ok(()) })
    }

    /// Chat-wide params, then prompt params, then the caller's overrides.
    fn merged_params<'a>(
        &'a self,
        chat_id: ChatId,
        _provider: &'a str,
        _alias: Option<&'a str>,
        prompt: Option<&'a str>,
        overrides: &'a ModelParams,
    ) -> SettingsFuture<'a, ModelParams> {
        let merged = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            let chat = state.chat_params.get(&chat_id).cloned().unwrap_or_default();
            let prompt = prompt
                .and_then(|p| state.prompt_params.get(&(chat_id, p.to_string())))
                .cloned()
                .unwrap_or_default();
            chat.merged(&prompt).merged(overrides)
        };
        Box::pin(async move { Ok(merged) })
    }
}
