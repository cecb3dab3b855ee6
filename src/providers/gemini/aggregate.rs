//! Non-streaming aggregation of a chunk stream.

use futures::{Stream, StreamExt};

use crate::providers::ProviderError;
use crate::providers::gemini::models::{StreamChunk, UsageData};
use crate::providers::types::{
    ChatResponse, Choice, FunctionCall, ResponseMessage, ToolCall, Usage,
};

/// Result of a non-streaming request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: Option<UsageData>,
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Completion {
    /// Wrap as an OpenAI chat completion.
    pub fn into_chat_response(self, model: &str) -> ChatResponse {
        let finish_reason = if self.tool_calls.is_some() {
            "tool_calls"
        } else {
            "stop"
        };
        let created = chrono::Utc::now().timestamp();

        ChatResponse {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
            object: "chat.completion".to_string(),
            created,
            model: model.to_string(),
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage {
                    role: "assistant".to_string(),
                    content: Some(self.content),
                    tool_calls: self.tool_calls,
                },
                finish_reason: Some(finish_reason.to_string()),
            }],
            usage: self.usage.map(|u| Usage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens + u.output_tokens,
            }),
        }
    }
}

/// Drain `stream` into a [`Completion`].
///
/// Text is concatenated, the last usage wins, tool codes become tool calls
/// and thinking output is dropped. Any stream error fails the whole call.
pub async fn aggregate<S>(stream: S) -> Result<Completion, ProviderError>
where
    S: Stream<Item = Result<StreamChunk, ProviderError>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut completion = Completion::default();
    let mut tool_calls = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if chunk.is_thinking() {
            continue;
        }
        match chunk {
            StreamChunk::Text(text) => completion.content.push_str(&text),
            StreamChunk::Usage(usage) => completion.usage = Some(usage),
            StreamChunk::ToolCode(tool) => tool_calls.push(ToolCall {
                id: format!("call_{}", uuid::Uuid::new_v4()),
                r#type: "function".to_string(),
                function: FunctionCall {
                    name: tool.name,
                    arguments: serde_json::to_string(&tool.args)?,
                },
            }),
            _ => {}
        }
    }

    completion.tool_calls = (!tool_calls.is_empty()).then_some(tool_calls);
    Ok(completion)
}
