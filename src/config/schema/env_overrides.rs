use super::Config;

pub const DEFAULT_MODEL_ENV: &str = "LLMRELAY_DEFAULT_MODEL";
pub const REQUEST_TIMEOUT_ENV: &str = "LLMRELAY_REQUEST_TIMEOUT_SECS";

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var(DEFAULT_MODEL_ENV)
            && !model.is_empty()
        {
            self.default_model = Some(model);
        }

        if let Ok(secs) = std::env::var(REQUEST_TIMEOUT_ENV)
            && let Ok(secs) = secs.parse::<u64>()
            && secs > 0
        {
            self.request_timeout_secs = secs;
        }

        // Keys in the file win; the environment only fills gaps.
        for provider in &mut self.providers {
            if provider.api_key.as_deref().is_some_and(|k| !k.trim().is_empty()) {
                continue;
            }
            if let Ok(key) = std::env::var(provider.api_key_env_var())
                && !key.trim().is_empty()
            {
                provider.api_key = Some(key.trim().to_string());
            }
        }
    }
}
