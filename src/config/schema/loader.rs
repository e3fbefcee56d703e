use super::{Config, ProviderKind};
use crate::error::ConfigError;
use crate::llm::registry::ModelSpec;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "LLMRELAY_CONFIG";

impl Config {
    /// `~/.llmrelay/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        Ok(home.join(".llmrelay").join("config.toml"))
    }

    /// Load from `path`, else `$LLMRELAY_CONFIG`, else the default location.
    ///
    /// A missing file at the default location yields an empty config; a
    /// missing explicit path is an error. Env overrides are applied and the
    /// result validated before it is returned.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let explicit = path
            .map(str::to_string)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().filter(|p| !p.is_empty()));

        let mut config = match explicit {
            Some(raw) => {
                let path = PathBuf::from(shellexpand::tilde(&raw).into_owned());
                Self::from_file(&path)?
            }
            None => {
                let path = Self::default_path()?;
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    tracing::debug!(path = %path.display(), "No config file, using defaults");
                    Self {
                        config_path: path,
                        ..Self::default()
                    }
                }
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(ConfigError::from)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|err| ConfigError::Load(err.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(ConfigError::Validation("provider name must not be empty".into()));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate provider name: {}",
                    provider.name
                )));
            }
            if provider.resolved_kind().is_none() {
                return Err(ConfigError::Validation(format!(
                    "provider {} needs a kind (one of {}, {}, {})",
                    provider.name,
                    ProviderKind::OpenAi,
                    ProviderKind::OpenRouter,
                    ProviderKind::Local
                )));
            }
        }

        if let Some(spec) = self.default_model.as_deref().filter(|s| !s.is_empty()) {
            let parsed: ModelSpec = spec
                .parse()
                .map_err(|_| ConfigError::Validation(format!("default_model {spec:?} is not provider:model")))?;
            if self.provider(&parsed.provider).is_none() {
                return Err(ConfigError::Validation(format!(
                    "default_model names unknown provider {}",
                    parsed.provider
                )));
            }
        }

        Ok(())
    }
}
