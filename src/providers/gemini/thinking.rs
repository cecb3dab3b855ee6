//! Synthetic reasoning preamble for thinking models.
//!
//! When real thoughts are not requested, a short canned reasoning passage
//! built around the latest user message is streamed before the answer.
//! It goes out either as `reasoning` chunks or, in stream-as-content mode,
//! as `thinking_content` pieces behind the opening marker. In the latter
//! case the thinking block stays open and the classifier closes it.

use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};

use crate::config::ThinkingSettings;
use crate::providers::gemini::constants::THINKING_OPEN_MARKER;
use crate::providers::gemini::models::StreamChunk;
use crate::providers::types::{ChatMessage, MessageContent, MessageRole};

/// Characters of the user message quoted in the preamble.
pub const PREVIEW_CHARS: usize = 100;

/// Fraction of the target size a piece may fall short by.
const MAX_SHORTFALL: f32 = 0.3;

/// Whether the preamble applies to this request.
pub fn should_fake_thinking(
    model_thinks: bool,
    include_reasoning: bool,
    settings: &ThinkingSettings,
) -> bool {
    model_thinks
        && include_reasoning
        && settings.enable_fake_thinking
        && !settings.enable_real_thinking
}

/// Text of the latest user message, cut to [`PREVIEW_CHARS`] plus `...`.
pub fn user_preview(messages: &[ChatMessage]) -> String {
    let text = messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::User)
        .and_then(|m| m.content.as_ref())
        .map(MessageContent::text)
        .unwrap_or_default();

    let text = text.trim();
    if text.chars().count() > PREVIEW_CHARS {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

/// The canned reasoning passage.
pub fn preamble_text(preview: &str) -> String {
    format!(
        "Let me look at what is being asked: \"{preview}\"\n\n\
         I'll work out the key points of the request and what a complete answer needs. \
         Then I'll check the relevant details and put together a clear response.\n"
    )
}

/// Split `text` into pieces of at most `target` characters.
///
/// A piece ends after the last whitespace or punctuation character in its
/// window, as long as that keeps it within 30% of `target`; otherwise it is
/// cut at exactly `target`. Concatenating the pieces gives back `text`.
pub fn chunk_text(text: &str, target: usize) -> Vec<String> {
    let target = target.max(1);
    let min_len = ((target as f32) * (1.0 - MAX_SHORTFALL)).ceil() as usize;
    let chars: Vec<char> = text.chars().collect();

    let mut pieces = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let remaining = chars.len() - start;
        let len = if remaining <= target {
            remaining
        } else {
            let window = &chars[start..start + target];
            window
                .iter()
                .rposition(|c| c.is_whitespace() || c.is_ascii_punctuation())
                .map(|i| i + 1)
                .filter(|&len| len >= min_len.max(1))
                .unwrap_or(target)
        };
        pieces.push(chars[start..start + len].iter().collect());
        start += len;
    }
    pieces
}

/// Preamble chunks paired with the delay that precedes each one.
pub fn preamble_chunks(preview: &str, settings: &ThinkingSettings) -> Vec<(StreamChunk, Duration)> {
    let text = preamble_text(preview);

    if settings.stream_thinking_as_content {
        let delay = settings.thinking_chunk_delay();
        std::iter::once((
            StreamChunk::ThinkingContent(THINKING_OPEN_MARKER.to_string()),
            Duration::ZERO,
        ))
        .chain(
            chunk_text(&text, settings.thinking_chunk_size)
                .into_iter()
                .map(|piece| (StreamChunk::ThinkingContent(piece), delay)),
        )
        .collect()
    } else {
        let delay = settings.reasoning_delay();
        text.split_inclusive('\n')
            .filter(|line| !line.trim().is_empty())
            .map(|line| (StreamChunk::Reasoning(line.to_string()), delay))
            .collect()
    }
}

/// Timed stream of the preamble chunks.
pub fn preamble_stream<E: Send + 'static>(
    preview: &str,
    settings: &ThinkingSettings,
) -> BoxStream<'static, Result<StreamChunk, E>> {
    stream::iter(preamble_chunks(preview, settings))
        .then(|(chunk, delay)| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(chunk)
        })
        .boxed()
}
