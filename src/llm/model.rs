use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Input/output modalities a model accepts and produces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Architecture {
    #[serde(default)]
    pub input_modalities: Vec<String>,
    #[serde(default)]
    pub output_modalities: Vec<String>,
}

/// Per-component rates as the provider reports them (decimal strings).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub completion: String,
    #[serde(default)]
    pub request: String,
    #[serde(default)]
    pub image: String,
}

impl Pricing {
    pub fn free() -> Self {
        Self {
            prompt: "0".into(),
            completion: "0".into(),
            request: "0".into(),
            image: "0".into(),
        }
    }

    /// Free only when all four components are exactly `"0"`.
    pub fn is_free(&self) -> bool {
        [&self.prompt, &self.completion, &self.request, &self.image]
            .iter()
            .all(|rate| rate.as_str() == "0")
    }
}

/// One catalog entry. Identified by `(provider, id)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u64>,
    #[serde(default)]
    pub architecture: Architecture,
    #[serde(default)]
    pub supported_parameters: Vec<String>,
    #[serde(default)]
    pub pricing: Pricing,
    /// Unix seconds.
    #[serde(default)]
    pub created: i64,
}

impl ModelInfo {
    /// An entry carrying only identity, used when a lookup came up empty.
    pub fn placeholder(provider: &str, id: &str) -> Self {
        Self {
            id: id.to_string(),
            provider: provider.to_string(),
            ..Self::default()
        }
    }

    pub fn is_free(&self) -> bool {
        self.pricing.is_free()
    }

    pub fn supports_tools(&self) -> bool {
        self.supported_parameters.iter().any(|p| p == "tools")
    }

    /// True only when the catalog lists parameters and `tools` is not among them.
    pub fn rejects_tools(&self) -> bool {
        !self.supported_parameters.is_empty() && !self.supports_tools()
    }

    pub fn accepts(&self, modality: &str) -> bool {
        self.architecture
            .input_modalities
            .iter()
            .any(|m| m == modality)
    }

    pub fn supports_file_input(&self) -> bool {
        self.accepts("file")
    }

    /// Matches the id, or the operator-assigned alias.
    pub fn answers_to(&self, name: &str) -> bool {
        self.id == name || self.alias.as_deref() == Some(name)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created, 0)
    }

    /// `provider:id`, the form model specs use.
    pub fn spec(&self) -> String {
        format!("{}:{}", self.provider, self.id)
    }
}
