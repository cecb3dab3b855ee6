//! Model capability lookup.
//!
//! The pipeline only needs three facts about a model: whether it thinks,
//! which budget bucket it falls in, and which input modalities it accepts.

use std::collections::HashMap;

/// Budget bucket used by the reasoning effort table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    Flash,
    Default,
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelFamily::Flash => write!(f, "flash"),
            ModelFamily::Default => write!(f, "default"),
        }
    }
}

/// What a model can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapabilities {
    pub thinking: bool,
    pub family: ModelFamily,
    pub images: bool,
    pub audio: bool,
    pub video: bool,
    pub pdf: bool,
}

impl ModelCapabilities {
    /// A multimodal model with the given thinking support and bucket.
    pub const fn multimodal(thinking: bool, family: ModelFamily) -> Self {
        Self {
            thinking,
            family,
            images: true,
            audio: true,
            video: true,
            pdf: true,
        }
    }

    pub const fn text_only(thinking: bool, family: ModelFamily) -> Self {
        Self {
            thinking,
            family,
            images: false,
            audio: false,
            video: false,
            pdf: false,
        }
    }
}

/// Read-only model id -> capabilities map shared by all requests.
pub trait CapabilityRegistry: Send + Sync {
    fn capabilities(&self, model: &str) -> Option<ModelCapabilities>;

    /// Ids of every known model.
    fn models(&self) -> Vec<String>;
}

/// Static registry of the Cloud Code Gemini models.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: HashMap<String, ModelCapabilities>,
}

impl ModelRegistry {
    pub fn builtin() -> Self {
        let (flash, default) = (ModelFamily::Flash, ModelFamily::Default);

        Self::from_entries([
            ("gemini-2.5-pro", ModelCapabilities::multimodal(true, default)),
            ("gemini-2.5-flash", ModelCapabilities::multimodal(true, flash)),
            ("gemini-2.5-flash-lite", ModelCapabilities::multimodal(true, flash)),
            ("gemini-3-pro-preview", ModelCapabilities::multimodal(true, default)),
            ("gemini-2.0-flash", ModelCapabilities::multimodal(false, flash)),
        ])
    }

    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, ModelCapabilities)>) -> Self {
        Self {
            models: entries
                .into_iter()
                .map(|(id, caps)| (id.to_string(), caps))
                .collect(),
        }
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CapabilityRegistry for ModelRegistry {
    fn capabilities(&self, model: &str) -> Option<ModelCapabilities> {
        self.models.get(model).copied()
    }

    fn models(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.models.keys().cloned().collect();
        ids.sort();
        ids
    }
}
