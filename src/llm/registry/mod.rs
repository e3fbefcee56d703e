mod chat_settings;
mod spec;

pub use chat_settings::{ChatId, ChatSettings, MemoryChatSettings, SettingsFuture};
pub use spec::ModelSpec;

use super::factory::create_providers;
use super::model::ModelInfo;
use super::params::ModelParams;
use super::streaming::ChunkStream;
use super::traits::Provider;
use super::types::{Completion, CompletionRequest, Message, ToolDeclaration};
use crate::config::{Config, ParamsConfig};
use crate::error::{CODE_UNSUPPORTED, Error};
use futures_util::future::join_all;
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Chat id meaning "no chat": skips the persisted-spec step.
pub const NO_CHAT: ChatId = 0;

/// Per-call knobs for [`ProviderRegistry::ask`] and
/// [`ask_stream`](ProviderRegistry::ask_stream).
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    pub chat_id: ChatId,
    /// Explicit `provider:model`; wins over the chat and global defaults.
    pub model_spec: Option<String>,
    /// Prompt name used to look up configured and stored params.
    pub prompt: Option<String>,
    /// Caller overrides, applied last.
    pub params: ModelParams,
    pub web_search: bool,
    pub headers: HeaderMap,
}

/// A provider together with the model a spec resolved to.
#[derive(Clone)]
pub struct Resolved {
    pub provider: Arc<dyn Provider>,
    pub model: ModelInfo,
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("provider", &self.provider.name())
            .field("model", &self.model.id)
            .finish()
    }
}

/// Result of [`ProviderRegistry::get_formatted_model`]. Displays as `provider:id`.
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedModel {
    pub provider: String,
    pub model: ModelInfo,
}

impl fmt::Display for FormattedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model.id)
    }
}

/// Every configured provider plus the policy for picking one per call.
///
/// The provider list is kept in registration order, which is also the probe
/// order for [`get_formatted_model`](Self::get_formatted_model). Lookups clone
/// the `Arc`s out so no lock is held across a provider call.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<Vec<Arc<dyn Provider>>>,
    chat_settings: Option<Arc<dyn ChatSettings>>,
    default_spec: Option<String>,
    params: ParamsConfig,
    /// alias -> (provider, model id)
    aliases: HashMap<String, (String, String)>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .field("default_spec", &self.default_spec)
            .field("chat_settings", &self.chat_settings.is_some())
            .finish_non_exhaustive()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured provider and take over defaults, params and
    /// aliases from `config`.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let registry = Self {
            default_spec: config.default_model.clone(),
            params: config.params.clone(),
            aliases: config.model_aliases(),
            ..Self::default()
        };
        for provider in create_providers(config)? {
            registry.register(provider);
        }
        Ok(registry)
    }

    #[must_use]
    pub fn with_chat_settings(mut self, settings: Arc<dyn ChatSettings>) -> Self {
        self.chat_settings = Some(settings);
        self
    }

    #[must_use]
    pub fn with_default_spec(mut self, spec: impl Into<String>) -> Self {
        self.default_spec = Some(spec.into());
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: ParamsConfig) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_alias(mut self, alias: &str, provider: &str, model: &str) -> Self {
        self.aliases
            .insert(alias.to_string(), (provider.to_string(), model.to_string()));
        self
    }

    /// Add a provider, replacing any registered under the same name in place.
    pub fn register(&self, provider: Arc<dyn Provider>) {
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        match providers.iter_mut().find(|p| p.name() == provider.name()) {
            Some(slot) => *slot = provider,
            None => providers.push(provider),
        }
    }

    pub fn provider(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|p| p.name() == name)
            .cloned()
    }

    pub fn providers(&self) -> Vec<Arc<dyn Provider>> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    fn require(&self, name: &str) -> Result<Arc<dyn Provider>, Error> {
        self.provider(name)
            .ok_or_else(|| Error::UnknownProvider(name.to_string()))
    }

    /// Pick provider and model for a call.
    ///
    /// An explicit spec wins, then the spec stored for `chat_id`, then the
    /// global default. Only the explicit spec is rejected for bad syntax; a
    /// stored spec that fails to parse, or names a model the provider does
    /// not offer, is skipped. An unknown provider name or a failing provider
    /// stops resolution at whichever step hits it.
    pub async fn resolve_model(&self, spec: Option<&str>, chat_id: ChatId) -> Result<Resolved, Error> {
        if let Some(raw) = spec.filter(|s| !s.trim().is_empty()) {
            let parsed: ModelSpec = raw.parse()?;
            let provider = self.require(&parsed.provider)?;
            return lookup_or_placeholder(provider, &parsed.model).await;
        }

        if chat_id != NO_CHAT
            && let Some(resolved) = self.resolve_chat_spec(chat_id).await?
        {
            return Ok(resolved);
        }

        let parsed: ModelSpec = self
            .default_spec
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .ok_or(Error::NoModelConfigured)?;
        let provider = self.require(&parsed.provider)?;
        lookup_or_placeholder(provider, &parsed.model).await
    }

    async fn resolve_chat_spec(&self, chat_id: ChatId) -> Result<Option<Resolved>, Error> {
        let Some(settings) = &self.chat_settings else {
            return Ok(None);
        };
        let Some(stored) = settings
            .model_spec(chat_id)
            .await
            .map_err(Error::ChatSettings)?
        else {
            return Ok(None);
        };

        let Ok(parsed) = stored.parse::<ModelSpec>() else {
            tracing::debug!(chat_id, spec = %stored, "Ignoring unparsable chat model spec");
            return Ok(None);
        };
        let provider = self.require(&parsed.provider)?;
        match provider.get_model_info(&parsed.model).await {
            Ok(model) => Ok(Some(Resolved { provider, model })),
            Err(err) if err.is_model_not_found() => {
                tracing::debug!(chat_id, spec = %stored, "Chat model spec did not resolve: {err}");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Validate `spec` against the registered providers and store it for `chat_id`.
    pub async fn set_chat_model(&self, chat_id: ChatId, spec: &str) -> Result<(), Error> {
        let parsed: ModelSpec = spec.parse()?;
        self.require(&parsed.provider)?;
        let Some(settings) = &self.chat_settings else {
            return Err(Error::ChatSettings(anyhow::anyhow!(
                "no chat settings store configured"
            )));
        };
        settings
            .set_model_spec(chat_id, &parsed.to_string())
            .await
            .map_err(Error::ChatSettings)
    }

    /// Configured defaults, then stored chat params, then caller overrides.
    pub async fn request_params(
        &self,
        resolved: &Resolved,
        options: &AskOptions,
    ) -> Result<ModelParams, Error> {
        let provider = resolved.provider.name();
        let alias = resolved.model.alias.as_deref();
        let prompt = options.prompt.as_deref();
        let defaults = self.params.layered(provider, alias, prompt);

        let overrides = match &self.chat_settings {
            Some(settings) if options.chat_id != NO_CHAT => settings
                .merged_params(options.chat_id, provider, alias, prompt, &options.params)
                .await
                .map_err(Error::ChatSettings)?,
            _ => options.params.clone(),
        };
        Ok(defaults.merged(&overrides))
    }

    async fn prepare(
        &self,
        stream: bool,
        messages: Vec<Message>,
        tools: Option<&[ToolDeclaration]>,
        options: &AskOptions,
    ) -> Result<(Resolved, CompletionRequest), Error> {
        let resolved = self
            .resolve_model(options.model_spec.as_deref(), options.chat_id)
            .await?;
        let params = self.request_params(&resolved, options).await?;
        let request = resolved.provider.create_request(
            stream,
            messages,
            tools,
            &resolved.model,
            &params,
            options.web_search,
        );
        tracing::debug!(
            provider = %resolved.provider.name(),
            model = %resolved.model.id,
            stream,
            "Dispatching completion"
        );
        Ok((resolved, request))
    }

    pub async fn ask(
        &self,
        messages: Vec<Message>,
        tools: Option<&[ToolDeclaration]>,
        options: &AskOptions,
    ) -> Result<Completion, Error> {
        let (resolved, request) = self.prepare(false, messages, tools, options).await?;
        Ok(resolved.provider.ask(&request, &options.headers).await?)
    }

    pub async fn ask_stream(
        &self,
        messages: Vec<Message>,
        tools: Option<&[ToolDeclaration]>,
        options: &AskOptions,
    ) -> Result<(ChunkStream, ModelInfo), Error> {
        let (resolved, request) = self.prepare(true, messages, tools, options).await?;
        let stream = resolved
            .provider
            .ask_stream(&request, &options.headers)
            .await?;
        Ok((stream, resolved.model))
    }

    /// Find which provider serves `model_name`.
    ///
    /// Aliases resolve first. A provider named explicitly, or embedded as a
    /// `provider:` prefix naming a registered provider, is asked directly;
    /// otherwise providers are probed in registration order.
    pub async fn get_formatted_model(
        &self,
        model_name: &str,
        provider_name: Option<&str>,
    ) -> Result<FormattedModel, Error> {
        let mut provider_name = provider_name.filter(|p| !p.is_empty()).map(str::to_string);
        let mut model_name = model_name.to_string();

        if let Some((provider, id)) = self.aliases.get(&model_name) {
            provider_name.get_or_insert_with(|| provider.clone());
            model_name.clone_from(id);
        }

        if provider_name.is_none()
            && let Ok(spec) = model_name.parse::<ModelSpec>()
            && self.provider(&spec.provider).is_some()
        {
            provider_name = Some(spec.provider);
            model_name = spec.model;
        }

        if let Some(name) = provider_name {
            let provider = self.require(&name)?;
            return match provider.get_model_info(&model_name).await {
                Ok(model) => Ok(FormattedModel { provider: name, model }),
                Err(err) if err.is_model_not_found() => Err(Error::ModelNotFound { model: model_name }),
                Err(err) => Err(err.into()),
            };
        }

        for provider in self.providers() {
            match provider.get_model_info(&model_name).await {
                Ok(model) => {
                    return Ok(FormattedModel {
                        provider: provider.name().to_string(),
                        model,
                    });
                }
                Err(err) if err.is_model_not_found() => {}
                Err(err) => {
                    tracing::warn!(provider = %provider.name(), "Model probe failed: {err}");
                }
            }
        }
        Err(Error::ModelNotFound { model: model_name })
    }

    /// One provider's catalog, or every provider's in registration order.
    pub async fn models(
        &self,
        provider_name: Option<&str>,
        only_free: bool,
        force_fresh: bool,
    ) -> Result<Vec<ModelInfo>, Error> {
        let providers = match provider_name {
            Some(name) => vec![self.require(name)?],
            None => self.providers(),
        };
        let mut all = Vec::new();
        for provider in providers {
            all.extend(provider.get_models(only_free, force_fresh).await?);
        }
        Ok(all)
    }

    /// A free model from `provider_name`, or from the first provider that
    /// offers random selection.
    pub async fn random_free_model(&self, provider_name: Option<&str>) -> Result<ModelSpec, Error> {
        if let Some(name) = provider_name {
            let provider = self.require(name)?;
            let id = provider.random_free_model().await?;
            return Ok(ModelSpec::new(name, id));
        }

        for provider in self.providers() {
            match provider.random_free_model().await {
                Ok(id) => return Ok(ModelSpec::new(provider.name(), id)),
                Err(err) if err.code == CODE_UNSUPPORTED => {}
                Err(err) => return Err(err.into()),
            }
        }
        Err(Error::ModelNotFound {
            model: "random free model".into(),
        })
    }

    /// Fetch every provider's catalog concurrently. Failures are logged and
    /// skipped; returns how many providers warmed successfully.
    pub async fn warm_up(&self) -> usize {
        let providers = self.providers();
        let results = join_all(providers.iter().map(|p| p.get_models(false, false))).await;

        let mut warmed = 0;
        for (provider, result) in providers.iter().zip(results) {
            match result {
                Ok(models) => {
                    warmed += 1;
                    tracing::info!(provider = %provider.name(), models = models.len(), "Catalog warmed");
                }
                Err(err) => {
                    tracing::warn!(provider = %provider.name(), "Catalog warm-up failed: {err}");
                }
            }
        }
        warmed
    }
}

/// Only a not-found lookup becomes a placeholder; provider failures surface.
async fn lookup_or_placeholder(provider: Arc<dyn Provider>, model: &str) -> Result<Resolved, Error> {
    let info = match provider.get_model_info(model).await {
        Ok(info) => info,
        Err(err) if err.is_model_not_found() => ModelInfo::placeholder(provider.name(), model),
        Err(err) => return Err(err.into()),
    };
    Ok(Resolved {
        provider,
        model: info,
    })
}
