use crate::llm::model::ModelInfo;
use crate::llm::params::ModelParams;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use strum::{AsRefStr, Display, EnumString};

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path the config was read from - not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Global `provider:model` fallback.
    #[serde(default)]
    pub default_model: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Registration order is probe order.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub params: ParamsConfig,
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            default_model: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            providers: Vec::new(),
            params: ParamsConfig::default(),
        }
    }
}

impl Config {
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// `alias -> (provider, id)` over every configured model entry.
    pub fn model_aliases(&self) -> HashMap<String, (String, String)> {
        self.providers
            .iter()
            .flat_map(|provider| {
                provider.models.iter().filter_map(move |model| {
                    model
                        .alias
                        .as_ref()
                        .map(|alias| (alias.clone(), (provider.name.clone(), model.id.clone())))
                })
            })
            .collect()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    OpenRouter,
    Local,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    /// Inferred from `name` when omitted.
    #[serde(default)]
    pub kind: Option<ProviderKind>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub chat_completions_path: Option<String>,
    #[serde(default)]
    pub models_path: Option<String>,
    #[serde(default)]
    pub only_free_models: bool,
    #[serde(default)]
    pub catalog_ttl_secs: Option<u64>,
    /// Operator-pinned entries; these win over the live catalog.
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

impl ProviderConfig {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn resolved_kind(&self) -> Option<ProviderKind> {
        self.kind.or_else(|| self.name.parse().ok())
    }

    /// `<NAME>_API_KEY`, with dashes and dots turned into underscores.
    pub fn api_key_env_var(&self) -> String {
        let stem: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{stem}_API_KEY")
    }
}

/// `ModelParams` defaults keyed by provider name, model alias and prompt name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamsConfig {
    #[serde(default)]
    pub provider: HashMap<String, ModelParams>,
    #[serde(default)]
    pub model: HashMap<String, ModelParams>,
    #[serde(default)]
    pub prompt: HashMap<String, ModelParams>,
}

impl ParamsConfig {
    /// Defaults for one call: provider, then model alias, then prompt, each
    /// overriding the previous.
    pub fn layered(&self, provider: &str, alias: Option<&str>, prompt: Option<&str>) -> ModelParams {
        let layers = [
            self.provider.get(provider),
            alias.and_then(|a| self.model.get(a)),
            prompt.and_then(|p| self.prompt.get(p)),
        ];
        layers
            .into_iter()
            .flatten()
            .fold(ModelParams::default(), |acc, layer| acc.merged(layer))
    }
}
