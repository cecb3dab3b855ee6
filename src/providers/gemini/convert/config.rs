//! Generation config assembly.
//!
//! | Input                         | Output                                        |
//! |-------------------------------|-----------------------------------------------|
//! | temperature, top_p, seed, ... | same-named `generationConfig` fields          |
//! | `max_tokens`                  | `maxOutputTokens`                             |
//! | `stop` (string or list)       | `stopSequences`                               |
//! | `response_format`             | `responseMimeType` (+ cleaned `responseSchema`) |
//! | thinking model                | `thinkingConfig {thinkingBudget, includeThoughts}` |
//!
//! Thinking budgets for thinking models are never 0: zero and anything
//! below -1 are replaced by -1 (dynamic).

use std::str::FromStr;

use tracing::debug;

use crate::config::{SafetyConfig, ThinkingSettings};
use crate::providers::gemini::constants::{
    DEFAULT_THINKING_BUDGET, EFFORT_HIGH_BUDGET, EFFORT_LOW_BUDGET, EFFORT_MEDIUM_BUDGET,
};
use crate::providers::gemini::convert::schema::clean_schema;
use crate::providers::gemini::models::google::{GenerationConfig, SafetySetting, ThinkingConfig};
use crate::providers::gemini::options::ChatOptions;
use crate::providers::gemini::registry::{ModelCapabilities, ModelFamily};
use crate::providers::types::ResponseFormat;

pub use crate::providers::gemini::models::google::{HarmCategory, SafetyThreshold};

// MARK: - Reasoning effort

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningEffort {
    None,
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    /// Token budget for this level in the given bucket.
    pub fn budget(self, family: ModelFamily) -> i32 {
        let pick = |(flash, default): (i32, i32)| match family {
            ModelFamily::Flash => flash,
            ModelFamily::Default => default,
        };
        match self {
            Self::None => 0,
            Self::Low => EFFORT_LOW_BUDGET,
            Self::Medium => pick(EFFORT_MEDIUM_BUDGET),
            Self::High => pick(EFFORT_HIGH_BUDGET),
        }
    }
}

impl FromStr for ReasoningEffort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Unknown reasoning effort: {s}")),
        }
    }
}

/// Resolve the caller's reasoning knobs into `(include_reasoning, budget)`.
///
/// A recognized effort level replaces any explicit budget; `none` also turns
/// reasoning output off. Unrecognized levels are ignored.
pub fn resolve_reasoning(
    effort: Option<&str>,
    include_reasoning: Option<bool>,
    thinking_budget: Option<i32>,
    caps: &ModelCapabilities,
) -> (bool, Option<i32>) {
    let include = include_reasoning.unwrap_or(true);

    match effort.map(ReasoningEffort::from_str) {
        Some(Ok(level)) => (level != ReasoningEffort::None, Some(level.budget(caps.family))),
        Some(Err(e)) => {
            debug!(error = %e, "Ignoring reasoning effort");
            (include, thinking_budget)
        }
        None => (include, thinking_budget),
    }
}

/// Clamp a budget to what thinking models accept.
pub fn validate_thinking_budget(budget: i32, caps: &ModelCapabilities) -> i32 {
    if caps.thinking && (budget == 0 || budget < DEFAULT_THINKING_BUDGET) {
        DEFAULT_THINKING_BUDGET
    } else {
        budget
    }
}

// MARK: - Builders

/// Build the `generationConfig` for one request.
pub fn build_generation_config(
    caps: &ModelCapabilities,
    options: &ChatOptions,
    thinking: &ThinkingSettings,
) -> GenerationConfig {
    let mut config = GenerationConfig {
        temperature: options.temperature,
        max_output_tokens: options.max_tokens,
        top_p: options.top_p,
        stop_sequences: options.stop.clone().map(|s| s.into_vec()),
        seed: options.seed,
        presence_penalty: options.presence_penalty,
        frequency_penalty: options.frequency_penalty,
        ..Default::default()
    };

    match &options.response_format {
        Some(ResponseFormat::JsonObject) => {
            config.response_mime_type = Some("application/json".to_string());
        }
        Some(ResponseFormat::JsonSchema { json_schema }) => {
            config.response_mime_type = Some("application/json".to_string());
            config.response_schema = json_schema.schema.as_ref().map(clean_schema);
        }
        Some(ResponseFormat::Text) | None => {}
    }

    if caps.thinking {
        let requested = options.thinking_budget.unwrap_or(thinking.default_budget);
        config.thinking_config = Some(ThinkingConfig {
            thinking_budget: validate_thinking_budget(requested, caps),
            include_thoughts: thinking.enable_real_thinking && options.include_reasoning,
        });
    }

    config
}

/// Safety settings for the configured categories, `None` when nothing is set.
pub fn build_safety_settings(safety: &SafetyConfig) -> Option<Vec<SafetySetting>> {
    let settings: Vec<SafetySetting> = safety
        .thresholds()
        .into_iter()
        .map(|(category, threshold)| SafetySetting {
            category,
            threshold,
        })
        .collect();
    (!settings.is_empty()).then_some(settings)
}
