use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `llmrelay`.
///
/// Provider calls fail with [`AiError`] alone; the registry and config layers
/// add their own variants on top so callers can match on resolution failures
/// separately from backend failures.
#[derive(Debug, Error)]
pub enum Error {
    // ── Provider ────────────────────────────────────────────────────────
    #[error(transparent)]
    Ai(#[from] AiError),

    // ── Resolution ──────────────────────────────────────────────────────
    #[error("invalid model spec {0:?}: expected provider:model")]
    InvalidModelSpec(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("model {model} not found on any provider")]
    ModelNotFound { model: String },

    #[error("no model configured: pass provider:model or set default_model")]
    NoModelConfigured,

    // ── Collaborators ───────────────────────────────────────────────────
    #[error("chat settings: {0}")]
    ChatSettings(#[source] anyhow::Error),

    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Provider errors ─────────────────────────────────────────────────────────

/// Error code stored on [`AiError`] when the request never produced a status.
pub const CODE_NETWORK: &str = "network_error";
/// Error code for response bodies that could not be decoded.
pub const CODE_DECODE: &str = "decode_error";
/// Error code for a successful response that carried no choices.
pub const CODE_EMPTY_RESPONSE: &str = "empty_response";
/// Error code for model lookups that came up empty.
pub const CODE_MODEL_NOT_FOUND: &str = "model_not_found";
/// Error code for operations a backend does not offer.
pub const CODE_UNSUPPORTED: &str = "unsupported";
/// Error code for a paid model on a provider restricted to free models.
pub const CODE_MODEL_NOT_FREE: &str = "model_not_free";

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failure reported by, or while talking to, a single provider.
#[derive(Debug, Error)]
#[error("{provider} error{}: {message}", describe_target(.model, .status, .code))]
pub struct AiError {
    pub provider: String,
    pub model: String,
    /// HTTP status, `0` when none was received.
    pub status: u16,
    pub code: String,
    pub message: String,
    #[source]
    pub source: Option<BoxError>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn describe_target(model: &str, status: &u16, code: &str) -> String {
    let mut out = String::new();
    if !model.is_empty() {
        out.push_str(&format!(" [{model}]"));
    }
    if *status != 0 {
        out.push_str(&format!(" ({status})"));
    }
    if !code.is_empty() {
        out.push_str(&format!(" {code}"));
    }
    out
}

/// Coarse failure classes used to decide whether a call is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Network,
    RateLimit,
    Server,
    ContentPolicy,
    Client,
    Unknown,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::RateLimit | Self::Server)
    }
}

const POLICY_MARKERS: [&str; 3] = ["policy", "moderation", "flagged"];

impl AiError {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            status: 0,
            code: code.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Transport-level failure before any HTTP status existed.
    pub fn network(provider: &str, model: &str, source: reqwest::Error) -> Self {
        let message = format!("request failed: {source}");
        Self::new(provider, model, CODE_NETWORK, message).with_source(source)
    }

    pub fn decode(provider: &str, model: &str, source: impl Into<BoxError>) -> Self {
        let source = source.into();
        let message = format!("response decode failed: {source}");
        Self {
            source: Some(source),
            ..Self::new(provider, model, CODE_DECODE, message)
        }
    }

    pub fn model_not_found(provider: &str, model: &str) -> Self {
        Self::new(
            provider,
            model,
            CODE_MODEL_NOT_FOUND,
            format!("model {model} is not offered by {provider}"),
        )
    }

    pub fn model_not_free(provider: &str, model: &str) -> Self {
        Self::new(
            provider,
            model,
            CODE_MODEL_NOT_FREE,
            format!("model {model} is not free and {provider} only serves free models"),
        )
    }

    pub fn unsupported(provider: &str, operation: &str) -> Self {
        Self::new(
            provider,
            "",
            CODE_UNSUPPORTED,
            format!("{provider} does not support {operation}"),
        )
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Classify from status first, then from message content.
    pub fn kind(&self) -> ErrorKind {
        match self.status {
            0 if self.is_transport_failure() => ErrorKind::Network,
            429 => ErrorKind::RateLimit,
            500.. => ErrorKind::Server,
            400 if self.mentions_policy() => ErrorKind::ContentPolicy,
            400..=499 => ErrorKind::Client,
            _ => ErrorKind::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub fn is_model_not_found(&self) -> bool {
        self.code == CODE_MODEL_NOT_FOUND
    }

    fn is_transport_failure(&self) -> bool {
        if self.code == CODE_NETWORK {
            return true;
        }
        self.source
            .as_deref()
            .and_then(|err| err.downcast_ref::<reqwest::Error>())
            .is_some_and(|err| err.is_connect() || err.is_timeout())
    }

    fn mentions_policy(&self) -> bool {
        let lower = self.message.to_ascii_lowercase();
        POLICY_MARKERS.iter().any(|marker| lower.contains(marker))
    }
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, Error>;
