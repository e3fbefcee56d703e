// ── Infrastructure ───────────────────────────────────────────────────────────
pub mod catalog;
pub mod http_client;
pub mod model;
pub mod params;
pub mod redact;
pub mod sse;
pub mod streaming;
pub mod traits;
pub mod types;
pub mod wire;

// ── Shared backend + registry ───────────────────────────────────────────────
pub mod compat;
pub mod factory;
pub mod registry;

// ── Provider implementations ────────────────────────────────────────────────
pub mod local;
pub mod openai;
pub mod openrouter;

// ── Infrastructure re-exports ───────────────────────────────────────────────
pub use catalog::{DEFAULT_CATALOG_TTL, ModelCatalog};
pub use http_client::{Transport, build_provider_client_with_timeout};
pub use model::{Architecture, ModelInfo, Pricing};
pub use params::{ModelParams, ReasoningEffort, ReasoningParams};
pub use redact::{sanitize_error_body, scrub_secrets};
pub use streaming::{Chunk, ChunkDecoder, ChunkStream, ToolCallAggregator};
pub use traits::{Provider, ProviderFuture};
pub use types::{
    Annotation, Completion, CompletionRequest, ContentPart, FunctionCall, FunctionDeclaration,
    Message, MessageContent, PdfEngine, Plugin, Role, ToolCall, ToolDeclaration, Usage,
};

// ── Provider + registry re-exports ──────────────────────────────────────────
pub use compat::CompatBackend;
pub use factory::{create_provider, create_providers};
pub use local::LocalProvider;
pub use openai::OpenAiProvider;
pub use openrouter::OpenRouterProvider;
pub use registry::{
    AskOptions, ChatId, ChatSettings, FormattedModel, MemoryChatSettings, ModelSpec, NO_CHAT,
    ProviderRegistry, Resolved,
};
