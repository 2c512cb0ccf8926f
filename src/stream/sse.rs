//! Server-sent-event decoding for backend streams, plus the small encoding
//! helpers used when the gateway re-emits a stream to its own callers.
//!
//! Backend streams are line oriented: each event is a single `data: {json}`
//! line and the stream ends with `data: [DONE]`. Lines without the `data:`
//! marker (comments, `event:` fields, blank separators) carry nothing and are
//! skipped.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::BytesMut;
use futures_util::Stream;
use memchr::memchr;
use pin_project_lite::pin_project;
use serde_json::Value;

use super::StreamChunk;
use crate::error::GatewayError;

pub const DATA_PREFIX: &str = "data:";
pub const DONE_SENTINEL: &str = "[DONE]";
const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Classification of one raw line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseFrame<'a> {
    Ignorable,
    Terminal,
    Payload(&'a str),
}

/// Classify a single line (without its `\n`; a trailing `\r` is tolerated).
#[must_use]
pub fn classify_line(line: &str) -> SseFrame<'_> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.is_empty() {
        return SseFrame::Ignorable;
    }
    let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
        return SseFrame::Ignorable;
    };
    let payload = rest.trim();
    if payload == DONE_SENTINEL {
        SseFrame::Terminal
    } else {
        SseFrame::Payload(payload)
    }
}

/// Parse the JSON text of a payload frame.
///
/// # Errors
///
/// Returns [`GatewayError::Decode`] when the payload is not valid JSON.
pub fn decode_payload(payload: &str) -> Result<StreamChunk, GatewayError> {
    serde_json::from_str::<Value>(payload)
        .map_err(|e| GatewayError::Decode(format!("invalid JSON in event-stream frame: {e}")))
}

enum LineStep {
    Skip,
    Done,
    Chunk(Result<StreamChunk, GatewayError>),
}

fn step_line(line: &[u8]) -> LineStep {
    if !line.starts_with(DATA_PREFIX.as_bytes()) {
        return LineStep::Skip;
    }
    let Ok(text) = std::str::from_utf8(line) else {
        return LineStep::Chunk(Err(GatewayError::Decode(
            "event-stream frame is not valid UTF-8".to_string(),
        )));
    };
    match classify_line(text) {
        SseFrame::Ignorable => LineStep::Skip,
        SseFrame::Terminal => LineStep::Done,
        SseFrame::Payload(payload) => LineStep::Chunk(decode_payload(payload)),
    }
}

// ---------------------------------------------------------------------------
// Synchronous decoder over already-split lines
// ---------------------------------------------------------------------------

/// Iterator form of the decoder, for callers that already hold the lines.
pub struct LineDecoder<I> {
    lines: I,
    finished: bool,
}

impl<'a, I> Iterator for LineDecoder<I>
where
    I: Iterator<Item = &'a str>,
{
    type Item = Result<StreamChunk, GatewayError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        for line in self.lines.by_ref() {
            match step_line(line.as_bytes()) {
                LineStep::Skip => {}
                LineStep::Done => break,
                LineStep::Chunk(chunk) => {
                    if chunk.is_err() {
                        self.finished = true;
                    }
                    return Some(chunk);
                }
            }
        }
        self.finished = true;
        None
    }
}

/// Decode chunks from an iterator of lines, stopping at the sentinel or the
/// first malformed payload.
pub fn decode_lines<'a, I>(lines: I) -> LineDecoder<I::IntoIter>
where
    I: IntoIterator<Item = &'a str>,
{
    LineDecoder {
        lines: lines.into_iter(),
        finished: false,
    }
}

// ---------------------------------------------------------------------------
// Streaming decoder over a byte stream
// ---------------------------------------------------------------------------

pin_project! {
    /// Decodes a byte stream into [`StreamChunk`] values.
    ///
    /// The inner byte stream is dropped as soon as the sequence ends (sentinel,
    /// transport close, or error), which releases the underlying connection.
    pub struct SseChunkStream<S> {
        #[pin]
        inner: Option<S>,
        buffer: BytesMut,
        scan_from: usize,
        finished: bool,
    }
}

impl<S> SseChunkStream<S> {
    pub fn new(byte_stream: S) -> Self {
        Self {
            inner: Some(byte_stream),
            buffer: BytesMut::with_capacity(4096),
            scan_from: 0,
            finished: false,
        }
    }
}

impl<S, E> Stream for SseChunkStream<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>>,
    E: std::fmt::Display,
{
    type Item = Result<StreamChunk, GatewayError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if *this.finished {
                return Poll::Ready(None);
            }

            let line = if let Some(rel) = memchr(b'\n', &this.buffer[*this.scan_from..]) {
                let end = *this.scan_from + rel;
                *this.scan_from = 0;
                let mut line = this.buffer.split_to(end + 1);
                line.truncate(end);
                Some(line)
            } else if this.inner.is_none() && !this.buffer.is_empty() {
                // Transport closed mid-line: the tail is still a complete frame.
                *this.scan_from = 0;
                Some(this.buffer.split())
            } else {
                None
            };

            if let Some(line) = line {
                match step_line(&line) {
                    LineStep::Skip => continue,
                    LineStep::Done => {
                        finish(&mut this.inner, this.buffer, this.finished);
                        return Poll::Ready(None);
                    }
                    LineStep::Chunk(Ok(chunk)) => return Poll::Ready(Some(Ok(chunk))),
                    LineStep::Chunk(Err(err)) => {
                        finish(&mut this.inner, this.buffer, this.finished);
                        return Poll::Ready(Some(Err(err)));
                    }
                }
            }

            *this.scan_from = this.buffer.len();
            let Some(inner) = this.inner.as_mut().as_pin_mut() else {
                *this.finished = true;
                return Poll::Ready(None);
            };
            match ready!(inner.poll_next(cx)) {
                Some(Ok(bytes)) => this.buffer.extend_from_slice(&bytes),
                Some(Err(err)) => {
                    finish(&mut this.inner, this.buffer, this.finished);
                    return Poll::Ready(Some(Err(GatewayError::Transport(format!(
                        "event stream read failed: {err}"
                    )))));
                }
                None => this.inner.set(None),
            }
        }
    }
}

fn finish<S>(inner: &mut Pin<&mut Option<S>>, buffer: &mut BytesMut, finished: &mut bool) {
    inner.set(None);
    buffer.clear();
    *finished = true;
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

/// Format a data-only SSE frame.
#[must_use]
pub fn data_frame(json: &str) -> String {
    let mut out = String::with_capacity(10 + json.len());
    out.push_str("data: ");
    out.push_str(json);
    out.push_str("\n\n");
    out
}

/// Format the `[DONE]` terminator frame.
#[must_use]
pub fn done_frame() -> String {
    DONE_FRAME.to_owned()
}
