pub mod schema;

pub use schema::{
    CONFIG_PATH_ENV, Config, DEFAULT_MODEL_ENV, DEFAULT_REQUEST_TIMEOUT_SECS, ParamsConfig,
    ProviderConfig, ProviderKind, REQUEST_TIMEOUT_ENV,
};
