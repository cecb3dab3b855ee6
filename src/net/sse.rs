//! Server-Sent Events framing.
//!
//! [`SseDecoder`] turns raw bytes into event payloads: lines starting with
//! `data:` are concatenated (prefix stripped) until a blank line commits the
//! event. [`SseStream`] wraps a byte stream and deserializes every payload
//! as JSON, skipping frames that fail to parse.
//!
//! Bytes are buffered until a full line is available, so the decoded output
//! does not depend on where the transport splits its reads, including splits
//! inside a multi-byte UTF-8 sequence.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::Stream;
use pin_project_lite::pin_project;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Incremental SSE payload decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    payload: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes and return every payload completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let Some(last_newline) = self.buffer.iter().rposition(|b| *b == b'\n') else {
            return events;
        };

        let complete: Vec<u8> = self.buffer.drain(..=last_newline).collect();
        for raw in complete[..complete.len() - 1].split(|b| *b == b'\n') {
            self.accept_line(raw, &mut events);
        }
        events
    }

    /// Flush whatever is left once the byte stream has ended.
    pub fn finish(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.accept_line(&rest, &mut events);
        }
        if !self.payload.is_empty() {
            events.push(std::mem::take(&mut self.payload));
        }
        events
    }

    fn accept_line(&mut self, raw: &[u8], events: &mut Vec<String>) {
        let line = String::from_utf8_lossy(raw);
        let line = line.strip_suffix('\r').unwrap_or(&line);

        if line.is_empty() {
            if !self.payload.is_empty() {
                events.push(std::mem::take(&mut self.payload));
            }
        } else if let Some(value) = line.strip_prefix("data:") {
            self.payload
                .push_str(value.strip_prefix(' ').unwrap_or(value));
        }
        // event:, id:, retry: and comments carry nothing we use.
    }
}

pin_project! {
    /// JSON-over-SSE stream.
    ///
    /// Transport errors are passed through; payloads that are not valid
    /// `T` are logged and dropped.
    pub struct SseStream<S, T> {
        #[pin]
        byte_stream: S,
        decoder: SseDecoder,
        pending: VecDeque<String>,
        done: bool,
        _frame: PhantomData<fn() -> T>,
    }
}

impl<S, T> SseStream<S, T> {
    pub fn new(byte_stream: S) -> Self {
        Self {
            byte_stream,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            done: false,
            _frame: PhantomData,
        }
    }
}

impl<S, T, E> Stream for SseStream<S, T>
where
    S: Stream<Item = Result<Bytes, E>>,
    T: DeserializeOwned,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            while let Some(payload) = this.pending.pop_front() {
                match serde_json::from_str::<T>(&payload) {
                    Ok(frame) => return Poll::Ready(Some(Ok(frame))),
                    Err(e) => {
                        warn!(error = %e, bytes = payload.len(), "Skipping malformed SSE frame");
                    }
                }
            }

            if *this.done {
                return Poll::Ready(None);
            }

            match this.byte_stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    this.pending.extend(this.decoder.feed(&chunk));
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => {
                    *this.done = true;
                    this.pending.extend(this.decoder.finish());
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use futures::stream;
    use proptest::prelude::*;
    use serde_json::{Value, json};

    fn decode_all(chunks: &[&[u8]]) -> Vec<String> {
        let mut decoder = SseDecoder::new();
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(decoder.feed(chunk));
        }
        out.extend(decoder.finish());
        out
    }

    async fn collect(chunks: Vec<&'static str>) -> Vec<Value> {
        let bytes = chunks
            .into_iter()
            .map(|c| Ok::<_, std::io::Error>(Bytes::from(c)))
            .collect::<Vec<_>>();
        SseStream::<_, Value>::new(stream::iter(bytes))
            .map(|r| r.unwrap())
            .collect()
            .await
    }

    #[test]
    fn test_events_split_on_blank_line() {
        let events = decode_all(&[b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\n"]);
        assert_eq!(events, vec![r#"{"a":1}"#, r#"{"b":2}"#]);
    }

    #[test]
    fn test_multiline_payload_concatenated() {
        let events = decode_all(&[b"data: {\"a\":\ndata: 1}\n\n"]);
        assert_eq!(events, vec![r#"{"a":1}"#]);
    }

    #[test]
    fn test_crlf_and_other_fields() {
        let events = decode_all(&[b"event: message\r\nid: 7\r\ndata: {}\r\n\r\n"]);
        assert_eq!(events, vec!["{}"]);
    }

    #[test]
    fn test_pending_payload_flushed_on_finish() {
        let events = decode_all(&[b"data: {\"a\":1}\n\ndata: {\"tail\":true}"]);
        assert_eq!(events, vec![r#"{"a":1}"#, r#"{"tail":true}"#]);
    }

    #[test]
    fn test_utf8_split_inside_character() {
        let text = "data: {\"t\":\"héllo\"}\n\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let events = decode_all(&[&text[..split], &text[split..]]);
        assert_eq!(events, vec![r#"{"t":"héllo"}"#]);
    }

    #[tokio::test]
    async fn test_stream_parses_json_frames() {
        let frames = collect(vec!["data: {\"n\":1}\n\nda", "ta: {\"n\":2}\n\n"]).await;
        assert_eq!(frames, vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[tokio::test]
    async fn test_malformed_frame_is_skipped() {
        let frames = collect(vec!["data: {\"n\":1}\n\ndata: {not json\n\ndata: {\"n\":3}\n\n"]).await;
        assert_eq!(frames, vec![json!({"n": 1}), json!({"n": 3})]);
    }

    #[tokio::test]
    async fn test_transport_error_passed_through() {
        let chunks = vec![
            Ok(Bytes::from("data: {\"n\":1}\n\n")),
            Err(std::io::Error::other("reset")),
        ];
        let mut sse = SseStream::<_, Value>::new(stream::iter(chunks));
        assert_eq!(sse.next().await.unwrap().unwrap(), json!({"n": 1}));
        assert!(sse.next().await.unwrap().is_err());
    }

    proptest! {
        #[test]
        fn prop_split_points_do_not_change_events(
            texts in prop::collection::vec("[a-zé語 ]{0,12}", 1..6),
            cuts in prop::collection::vec(0usize..400, 0..8),
        ) {
            let body: String = texts
                .iter()
                .map(|t| format!("data: {}\n\n", json!({ "t": t })))
                .collect();
            let bytes = body.as_bytes();

            let whole = decode_all(&[bytes]);

            let mut points: Vec<usize> = cuts.into_iter().map(|c| c % (bytes.len() + 1)).collect();
            points.sort_unstable();
            let mut pieces: Vec<&[u8]> = Vec::new();
            let mut start = 0;
            for p in points {
                pieces.push(&bytes[start..p]);
                start = p;
            }
            pieces.push(&bytes[start..]);

            prop_assert_eq!(decode_all(&pieces), whole.clone());
            prop_assert_eq!(whole.len(), texts.len());
        }
    }
}
