use super::local::LocalProvider;
use super::openai::OpenAiProvider;
use super::openrouter::OpenRouterProvider;
use super::traits::Provider;
use crate::config::{Config, ProviderConfig, ProviderKind};
use crate::error::{ConfigError, Error};
use std::sync::Arc;

/// Build one provider. The kind comes from `config.kind`, else the name.
pub fn create_provider(
    config: &ProviderConfig,
    timeout_secs: u64,
) -> Result<Arc<dyn Provider>, Error> {
    let kind = config.resolved_kind().ok_or_else(|| {
        ConfigError::Validation(format!(
            "cannot infer provider kind for {:?}; set kind explicitly",
            config.name
        ))
    })?;

    let provider: Arc<dyn Provider> = match kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::from_config(config, timeout_secs)?),
        ProviderKind::OpenRouter => {
            Arc::new(OpenRouterProvider::from_config(config, timeout_secs)?)
        }
        ProviderKind::Local => Arc::new(LocalProvider::from_config(config, timeout_secs)?),
    };

    tracing::debug!(provider = %config.name, %kind, "Provider created");
    Ok(provider)
}

/// Every configured provider, in configuration order.
pub fn create_providers(config: &Config) -> Result<Vec<Arc<dyn Provider>>, Error> {
    config
        .providers
        .iter()
        .map(|provider| create_provider(provider, config.request_timeout_secs))
        .collect()
}
