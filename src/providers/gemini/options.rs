//! Per-request options accepted by the provider core.

use crate::providers::gemini::convert::config::resolve_reasoning;
use crate::providers::gemini::registry::ModelCapabilities;
use crate::providers::types::{
    ChatRequest, NativeToolsPriority, ResponseFormat, StopSequence, Tool, ToolChoice,
};

/// Native grounding tools requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NativeToolFlags {
    /// Master switch; the individual flags are ignored when off.
    pub enabled: bool,
    pub search: bool,
    pub url_context: bool,
    pub priority: NativeToolsPriority,
}

impl NativeToolFlags {
    pub fn any_requested(&self) -> bool {
        self.enabled && (self.search || self.url_context)
    }
}

/// Generation options for one request.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Whether the caller wants reasoning output.
    pub include_reasoning: bool,
    /// Explicit budget; `None` uses the configured default.
    pub thinking_budget: Option<i32>,
    pub tools: Vec<Tool>,
    pub tool_choice: Option<ToolChoice>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub stop: Option<StopSequence>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub seed: Option<i64>,
    pub response_format: Option<ResponseFormat>,
    pub native_tools: NativeToolFlags,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            include_reasoning: true,
            thinking_budget: None,
            tools: Vec::new(),
            tool_choice: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            stop: None,
            presence_penalty: None,
            frequency_penalty: None,
            seed: None,
            response_format: None,
            native_tools: NativeToolFlags::default(),
        }
    }
}

impl ChatOptions {
    /// Derive options from an OpenAI request for a model with `caps`.
    ///
    /// A valid `reasoning_effort` wins over `thinking_budget`.
    pub fn from_request(request: &ChatRequest, caps: &ModelCapabilities) -> Self {
        let (include_reasoning, thinking_budget) = resolve_reasoning(
            request.reasoning_effort.as_deref(),
            request.include_reasoning,
            request.thinking_budget,
            caps,
        );

        Self {
            include_reasoning,
            thinking_budget,
            tools: request.tools.clone().unwrap_or_default(),
            tool_choice: request.tool_choice.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stop: request.stop.clone(),
            presence_penalty: request.presence_penalty,
            frequency_penalty: request.frequency_penalty,
            seed: request.seed,
            response_format: request.response_format.clone(),
            native_tools: NativeToolFlags {
                enabled: request.enable_native_tools,
                search: request.enable_search,
                url_context: request.enable_url_context,
                priority: request.native_tools_priority,
            },
        }
    }
}
