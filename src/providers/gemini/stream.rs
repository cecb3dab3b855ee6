//! Response classification: backend frames to normalized chunks.
//!
//! The classifier walks the parts of the first candidate in order and keeps
//! one piece of state, the [`ThinkingPhase`] of inline thinking output:
//!
//! ```text
//!   Idle --(first thought, content mode)--> Open --(text / tool call)--> Closed
//! ```
//!
//! While Open, the closing marker is emitted right before the first
//! `text` or `tool_code` chunk. A closed block is never reopened.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{BoxStream, Stream};
use pin_project_lite::pin_project;
use tracing::trace;

use crate::net::SseStream;
use crate::providers::ProviderError;
use crate::providers::gemini::citation::{CitationAnnotator, PassthroughAnnotator};
use crate::providers::gemini::constants::{
    THINKING_CLOSE_MARKER, THINKING_OPEN_MARKER, THINKING_TAG_CLOSE, THINKING_TAG_OPEN,
};
use crate::providers::gemini::models::google::{
    GenerateContentResponse, Part, StreamFrame, UsageMetadata,
};
use crate::providers::gemini::models::{StreamChunk, ToolCodeData, UsageData};

/// Chunk stream handed to callers.
pub type ChunkStream = BoxStream<'static, Result<StreamChunk, ProviderError>>;

/// State of inline (`<thinking>` delimited) output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThinkingPhase {
    #[default]
    Idle,
    Open,
    Closed,
}

/// Turns backend frames into [`StreamChunk`]s.
pub struct ResponseClassifier {
    phase: ThinkingPhase,
    thinking_as_content: bool,
    grounding_active: bool,
    annotator: Arc<dyn CitationAnnotator>,
}

impl std::fmt::Debug for ResponseClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseClassifier")
            .field("phase", &self.phase)
            .field("thinking_as_content", &self.thinking_as_content)
            .field("grounding_active", &self.grounding_active)
            .finish()
    }
}

impl ResponseClassifier {
    pub fn new(thinking_as_content: bool) -> Self {
        Self {
            phase: ThinkingPhase::Idle,
            thinking_as_content,
            grounding_active: false,
            annotator: Arc::new(PassthroughAnnotator),
        }
    }

    /// Start with an already open block, for when the preamble opened it.
    pub fn with_phase(mut self, phase: ThinkingPhase) -> Self {
        self.phase = phase;
        self
    }

    /// Pass answer text through `annotator` while grounding tools are active.
    pub fn with_grounding(mut self, active: bool, annotator: Arc<dyn CitationAnnotator>) -> Self {
        self.grounding_active = active;
        self.annotator = annotator;
        self
    }

    pub fn phase(&self) -> ThinkingPhase {
        self.phase
    }

    /// Classify one frame.
    pub fn classify(&mut self, frame: &GenerateContentResponse) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();

        if let Some(candidate) = frame.candidates.first() {
            let grounding = candidate.grounding_metadata.as_ref();
            if let Some(content) = &candidate.content {
                for part in &content.parts {
                    self.classify_part(part, grounding, &mut chunks);
                }
            }
        }

        if let Some(usage) = &frame.usage_metadata {
            chunks.push(StreamChunk::Usage(usage_data(usage)));
        }

        chunks
    }

    /// Plain text injected by the pipeline itself, such as a fallback notice.
    pub fn notice(&mut self, text: &str) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();
        self.close(&mut chunks);
        chunks.push(StreamChunk::Text(text.to_string()));
        chunks
    }

    fn classify_part(
        &mut self,
        part: &Part,
        grounding: Option<&serde_json::Value>,
        chunks: &mut Vec<StreamChunk>,
    ) {
        if let Some(call) = &part.function_call {
            self.close(chunks);
            chunks.push(StreamChunk::ToolCode(ToolCodeData {
                name: call.name.clone(),
                args: call.args.clone(),
            }));
            return;
        }

        let Some(text) = part.text.as_deref() else {
            return;
        };

        if part.is_thought() {
            self.thought(text, chunks);
            return;
        }

        match split_thinking_tags(text) {
            Some((inner, rest)) => {
                self.thought(inner, chunks);
                if !rest.trim().is_empty() {
                    self.text(&rest, grounding, chunks);
                }
            }
            None => self.text(text, grounding, chunks),
        }
    }

    fn thought(&mut self, text: &str, chunks: &mut Vec<StreamChunk>) {
        if !self.thinking_as_content {
            chunks.push(StreamChunk::RealThinking(text.to_string()));
            return;
        }
        if self.phase == ThinkingPhase::Idle {
            chunks.push(StreamChunk::ThinkingContent(THINKING_OPEN_MARKER.to_string()));
            self.phase = ThinkingPhase::Open;
        }
        chunks.push(StreamChunk::ThinkingContent(text.to_string()));
    }

    fn text(&mut self, text: &str, grounding: Option<&serde_json::Value>, chunks: &mut Vec<StreamChunk>) {
        if text.is_empty() {
            return;
        }
        self.close(chunks);
        let text = if self.grounding_active {
            self.annotator.annotate(text, grounding)
        } else {
            text.to_string()
        };
        chunks.push(StreamChunk::Text(text));
    }

    fn close(&mut self, chunks: &mut Vec<StreamChunk>) {
        if self.phase == ThinkingPhase::Open {
            chunks.push(StreamChunk::ThinkingContent(THINKING_CLOSE_MARKER.to_string()));
            self.phase = ThinkingPhase::Closed;
        }
    }
}

/// Split text carrying an inline `<thinking>...</thinking>` segment into the
/// enclosed thought and the remaining text.
fn split_thinking_tags(text: &str) -> Option<(&str, String)> {
    let open = text.find(THINKING_TAG_OPEN)?;
    let inner_start = open + THINKING_TAG_OPEN.len();
    let close = inner_start + text[inner_start..].find(THINKING_TAG_CLOSE)?;
    let rest = format!(
        "{}{}",
        &text[..open],
        &text[close + THINKING_TAG_CLOSE.len()..]
    );
    Some((&text[inner_start..close], rest))
}

fn usage_data(usage: &UsageMetadata) -> UsageData {
    UsageData {
        input_tokens: usage.prompt_token_count.unwrap_or(0),
        output_tokens: usage.candidates_token_count.unwrap_or(0),
    }
}

pin_project! {
    /// Classified chunks of one backend response.
    ///
    /// Notices queued by the retry loop are emitted first, through the
    /// classifier, so an open thinking block is closed before them.
    pub struct ClassifiedStream<S> {
        #[pin]
        frames: SseStream<S, StreamFrame>,
        classifier: ResponseClassifier,
        pending: VecDeque<StreamChunk>,
    }
}

impl<S> ClassifiedStream<S> {
    pub fn new(byte_stream: S, mut classifier: ResponseClassifier, notices: &[String]) -> Self {
        let pending = notices
            .iter()
            .flat_map(|notice| classifier.notice(notice))
            .collect();
        Self {
            frames: SseStream::new(byte_stream),
            classifier,
            pending,
        }
    }
}

impl<S> Stream for ClassifiedStream<S>
where
    S: Stream<Item = Result<Bytes, ProviderError>>,
{
    type Item = Result<StreamChunk, ProviderError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(chunk) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(chunk)));
            }

            match this.frames.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(frame))) => {
                    if let Some(response) = &frame.response {
                        let chunks = this.classifier.classify(response);
                        trace!(count = chunks.len(), "Classified frame");
                        this.pending.extend(chunks);
                    }
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
