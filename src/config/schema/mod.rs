mod env_overrides;
mod loader;
#[cfg(test)]
pub(crate) mod test_env;
mod types;

pub use env_overrides::{DEFAULT_MODEL_ENV, REQUEST_TIMEOUT_ENV};
pub use loader::CONFIG_PATH_ENV;
pub use types::{
    Config, DEFAULT_REQUEST_TIMEOUT_SECS, ParamsConfig, ProviderConfig, ProviderKind,
};
