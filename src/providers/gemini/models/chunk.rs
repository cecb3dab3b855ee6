//! Normalized output of the streaming pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One unit of output, serialized as `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Answer text.
    Text(String),
    /// Token counts from the latest usage frame.
    Usage(UsageData),
    /// Synthetic reasoning, kept apart from content.
    Reasoning(String),
    /// Thinking streamed inline with content, including the markers.
    ThinkingContent(String),
    /// The model's own thoughts, kept apart from content.
    RealThinking(String),
    /// A function call requested by the model.
    ToolCode(ToolCodeData),
}

impl StreamChunk {
    /// Whether this chunk belongs to the thinking side of the output.
    pub fn is_thinking(&self) -> bool {
        matches!(
            self,
            Self::Reasoning(_) | Self::ThinkingContent(_) | Self::RealThinking(_)
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageData {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCodeData {
    pub name: String,
    pub args: Value,
}
