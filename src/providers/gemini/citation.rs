//! Citation post-processing hook for grounded answers.

use serde_json::Value;

/// Rewrites answer text using the grounding metadata of its candidate.
///
/// Called only while native grounding tools are active.
pub trait CitationAnnotator: Send + Sync {
    fn annotate(&self, text: &str, grounding: Option<&Value>) -> String;
}

/// Leaves text untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughAnnotator;

impl CitationAnnotator for PassthroughAnnotator {
    fn annotate(&self, text: &str, _grounding: Option<&Value>) -> String {
        text.to_string()
    }
}
