//! Tool selection: custom function tools, native grounding tools, and
//! the `toolConfig` that goes with them.
//!
//! | Priority | Sent when native tools are requested |
//! |----------|--------------------------------------|
//! | native   | native tools only                    |
//! | custom   | function declarations only           |
//! | mixed    | both                                 |
//!
//! Without any native tool requested the function declarations are always
//! sent.

use crate::providers::gemini::convert::clean_schema;
use crate::providers::gemini::models::google::{FunctionDeclaration, GoogleTool, ToolConfig};
use crate::providers::gemini::options::NativeToolFlags;
use crate::providers::types::{NativeToolsPriority, Tool, ToolChoice, ToolChoiceMode};

/// Tools resolved for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedTools {
    pub tools: Option<Vec<GoogleTool>>,
    pub tool_config: Option<ToolConfig>,
    /// Native grounding tools are part of the request.
    pub grounding_active: bool,
}

/// Policy deciding which tools a request carries.
pub trait ToolSelector: Send + Sync {
    fn select(
        &self,
        tools: &[Tool],
        tool_choice: Option<&ToolChoice>,
        native: &NativeToolFlags,
        model: &str,
    ) -> ResolvedTools;
}

/// Applies the native-tools priority table above.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultToolSelector;

impl ToolSelector for DefaultToolSelector {
    fn select(
        &self,
        tools: &[Tool],
        tool_choice: Option<&ToolChoice>,
        native: &NativeToolFlags,
        _model: &str,
    ) -> ResolvedTools {
        let native_tools = native_tools(native);
        let (send_native, send_custom) = if native_tools.is_empty() {
            (false, true)
        } else {
            match native.priority {
                NativeToolsPriority::Native => (true, false),
                NativeToolsPriority::Custom => (false, true),
                NativeToolsPriority::Mixed => (true, true),
            }
        };

        let mut selected = Vec::new();
        let mut has_functions = false;
        if send_custom && !tools.is_empty() {
            selected.push(GoogleTool::functions(convert_tools(tools)));
            has_functions = true;
        }
        if send_native {
            selected.extend(native_tools);
        }

        ResolvedTools {
            grounding_active: send_native,
            tool_config: if has_functions {
                tool_choice.map(convert_tool_choice)
            } else {
                None
            },
            tools: (!selected.is_empty()).then_some(selected),
        }
    }
}

fn native_tools(native: &NativeToolFlags) -> Vec<GoogleTool> {
    if !native.any_requested() {
        return Vec::new();
    }
    let mut tools = Vec::new();
    if native.search {
        tools.push(GoogleTool::google_search());
    }
    if native.url_context {
        tools.push(GoogleTool::url_context());
    }
    tools
}

/// Convert OpenAI function tools to declarations with cleaned schemas.
pub fn convert_tools(tools: &[Tool]) -> Vec<FunctionDeclaration> {
    tools
        .iter()
        .map(|tool| FunctionDeclaration {
            name: tool.function.name.clone(),
            description: tool.function.description.clone(),
            parameters: tool.function.parameters.as_ref().map(clean_schema),
        })
        .collect()
}

/// Map an OpenAI `tool_choice` to a function calling config.
pub fn convert_tool_choice(choice: &ToolChoice) -> ToolConfig {
    match choice {
        ToolChoice::Mode(ToolChoiceMode::Auto) => ToolConfig::auto(),
        ToolChoice::Mode(ToolChoiceMode::None) => ToolConfig::none(),
        ToolChoice::Mode(ToolChoiceMode::Required) => ToolConfig::any(),
        ToolChoice::Named(named) => ToolConfig::force(named.function.name.as_str()),
    }
}
