use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    Medium,
    High,
}

/// Reasoning controls, sent as the nested `reasoning` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<ReasoningEffort>,
}

impl ReasoningParams {
    #[must_use]
    pub fn merged(&self, overrides: &Self) -> Self {
        Self {
            enabled: overrides.enabled.or(self.enabled),
            exclude: overrides.exclude.or(self.exclude),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            effort: overrides.effort.or(self.effort),
        }
    }
}

/// Optional generation parameters. `None` means "not set here".
///
/// Serialized flat into the completion request; unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningParams>,
}

impl ModelParams {
    /// Right-biased field-wise merge: every field set on `overrides` wins.
    ///
    /// The nested reasoning object merges field by field as well, so
    /// `a.merged(b).merged(b) == a.merged(b)`.
    #[must_use]
    pub fn merged(&self, overrides: &Self) -> Self {
        let reasoning = match (&self.reasoning, &overrides.reasoning) {
            (Some(base), Some(over)) => Some(base.merged(over)),
            (base, over) => over.clone().or_else(|| base.clone()),
        };

        Self {
            temperature: overrides.temperature.or(self.temperature),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            top_p: overrides.top_p.or(self.top_p),
            frequency_penalty: overrides.frequency_penalty.or(self.frequency_penalty),
            presence_penalty: overrides.presence_penalty.or(self.presence_penalty),
            stop: overrides.stop.clone().or_else(|| self.stop.clone()),
            reasoning,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
