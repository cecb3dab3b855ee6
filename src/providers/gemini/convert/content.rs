//! Message conversion from the OpenAI chat format to Cloud Code contents.
//!
//! ## Role Mapping
//!
//! | OpenAI    | Google |
//! |-----------|--------|
//! | assistant | model  |
//! | user      | user   |
//! | system    | user   |
//! | tool      | user   |
//!
//! ## Part Mapping
//!
//! | OpenAI part   | Google part                                   |
//! |---------------|-----------------------------------------------|
//! | text          | `{ text }`                                    |
//! | image_url     | `{ inlineData }` (data URI) or `{ fileData }` |
//! | input_audio   | `{ inlineData: audio/<format> }`              |
//! | input_video   | `{ inlineData }` or `{ fileData }` + `videoMetadata` |
//! | input_pdf     | `{ inlineData: application/pdf }`             |
//! | tool message  | `{ functionResponse: { name, response: { result } } }` |
//! | tool_calls    | `{ functionCall: { name, args } }`            |

use serde_json::{Value, json};

use crate::providers::ProviderError;
use crate::providers::gemini::convert::media::{
    DEFAULT_IMAGE_MIME, ImageSource, validate_image_url, validate_pdf,
};
use crate::providers::gemini::models::google::{Content, Part, VideoMetadata};
use crate::providers::gemini::registry::ModelCapabilities;
use crate::providers::types::{
    ChatMessage, ContentPart, InputVideo, MessageContent, MessageRole, ToolCall,
};

/// Name used for tool results that carry no `tool_call_id`.
pub const UNKNOWN_FUNCTION_NAME: &str = "unknown_function";

/// Convert an OpenAI role to a Google role.
pub fn convert_role(role: &MessageRole) -> &'static str {
    match role {
        MessageRole::Assistant => "model",
        MessageRole::User | MessageRole::System | MessageRole::Tool => "user",
    }
}

/// Pull system messages out of an OpenAI message list.
///
/// Their text is joined with blank lines into one system prompt; the
/// remaining messages keep their order.
pub fn split_system_prompt(messages: &[ChatMessage]) -> (Option<String>, Vec<ChatMessage>) {
    let (system, rest): (Vec<&ChatMessage>, Vec<&ChatMessage>) = messages
        .iter()
        .partition(|m| m.role == MessageRole::System);

    let prompt: Vec<String> = system
        .iter()
        .filter_map(|m| m.content.as_ref().map(MessageContent::text))
        .filter(|text| !text.trim().is_empty())
        .collect();

    let prompt = (!prompt.is_empty()).then(|| prompt.join("\n\n"));
    (prompt, rest.into_iter().cloned().collect())
}

/// Convert a conversation history into backend contents, one per message.
pub fn convert_messages(
    messages: &[ChatMessage],
    caps: &ModelCapabilities,
) -> Result<Vec<Content>, ProviderError> {
    messages
        .iter()
        .map(|message| {
            let parts = convert_message_parts(message, caps)?;
            Ok(Content {
                role: Some(convert_role(&message.role).to_string()),
                parts,
            })
        })
        .collect()
}

fn convert_message_parts(
    message: &ChatMessage,
    caps: &ModelCapabilities,
) -> Result<Vec<Part>, ProviderError> {
    if message.role == MessageRole::Tool {
        let name = message
            .tool_call_id
            .as_deref()
            .unwrap_or(UNKNOWN_FUNCTION_NAME);
        let result = message
            .content
            .as_ref()
            .map(MessageContent::to_plain_string)
            .unwrap_or_default();
        return Ok(vec![Part::function_response(name, json!({ "result": result }))]);
    }

    if message.role == MessageRole::Assistant {
        if let Some(calls) = message.tool_calls.as_ref().filter(|c| !c.is_empty()) {
            return convert_tool_calls(message.content.as_ref(), calls);
        }
    }

    match &message.content {
        None => Ok(vec![Part::text("")]),
        Some(MessageContent::Text(text)) => Ok(vec![Part::text(text.as_str())]),
        Some(MessageContent::Parts(parts)) => parts
            .iter()
            .map(|part| convert_content_part(part, caps))
            .collect(),
        Some(other @ MessageContent::Other(_)) => Ok(vec![Part::text(other.to_plain_string())]),
    }
}

fn convert_tool_calls(
    content: Option<&MessageContent>,
    calls: &[ToolCall],
) -> Result<Vec<Part>, ProviderError> {
    let mut parts = Vec::with_capacity(calls.len() + 1);

    if let Some(text) = content.map(MessageContent::text) {
        if !text.trim().is_empty() {
            parts.push(Part::text(text));
        }
    }

    for call in calls {
        let args: Value = if call.function.arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&call.function.arguments).map_err(|e| {
                ProviderError::validation(format!(
                    "Tool call '{}' has invalid JSON arguments: {e}",
                    call.function.name
                ))
            })?
        };
        parts.push(Part::function_call(call.function.name.as_str(), args));
    }

    Ok(parts)
}

/// Convert one OpenAI content part.
pub fn convert_content_part(
    part: &ContentPart,
    caps: &ModelCapabilities,
) -> Result<Part, ProviderError> {
    check_modality(part, caps)?;

    match part {
        ContentPart::Text { text } => Ok(Part::text(text.as_str())),

        ContentPart::ImageUrl { image_url } => match validate_image_url(&image_url.url)? {
            ImageSource::Inline { mime_type, data } => Ok(Part::inline_data(mime_type, data)),
            ImageSource::Remote { mime_type, url } => Ok(Part::file_data(
                mime_type.unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string()),
                url,
            )),
        },

        ContentPart::InputAudio { input_audio } => Ok(Part::inline_data(
            format!("audio/{}", input_audio.format),
            input_audio.data.as_str(),
        )),

        ContentPart::InputVideo { input_video } => convert_video(input_video),

        ContentPart::InputPdf { input_pdf } => {
            let data = validate_pdf(&input_pdf.data)?;
            Ok(Part::inline_data("application/pdf", data))
        }
    }
}

fn convert_video(video: &InputVideo) -> Result<Part, ProviderError> {
    let part = match (&video.data, &video.format, &video.url) {
        (Some(data), Some(format), _) => Part::inline_data(format!("video/{format}"), data.as_str()),
        (_, format, Some(url)) => Part::file_data(
            format!("video/{}", format.as_deref().unwrap_or("mp4")),
            url.as_str(),
        ),
        _ => {
            return Err(ProviderError::validation(
                "Video part needs either data with a format or a url",
            ));
        }
    };

    Ok(part.with_video_metadata(video_metadata(video)))
}

fn video_metadata(video: &InputVideo) -> Option<VideoMetadata> {
    if video.start_offset.is_none() && video.end_offset.is_none() && video.fps.is_none() {
        return None;
    }
    Some(VideoMetadata {
        start_offset: video.start_offset.clone(),
        end_offset: video.end_offset.clone(),
        fps: video.fps,
    })
}

fn check_modality(part: &ContentPart, caps: &ModelCapabilities) -> Result<(), ProviderError> {
    let (supported, kind) = match part {
        ContentPart::Text { .. } => return Ok(()),
        ContentPart::ImageUrl { .. } => (caps.images, "image"),
        ContentPart::InputAudio { .. } => (caps.audio, "audio"),
        ContentPart::InputVideo { .. } => (caps.video, "video"),
        ContentPart::InputPdf { .. } => (caps.pdf, "PDF"),
    };
    if supported {
        Ok(())
    } else {
        Err(ProviderError::validation(format!(
            "Model does not accept {kind} input"
        )))
    }
}
