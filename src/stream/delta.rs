//! Assistant text extraction from chat-completion stream chunks.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use serde_json::Value;
use smallvec::SmallVec;

use super::{ChunkStream, StreamChunk};
use crate::error::GatewayError;

/// Text fragments from one chunk; almost always zero or one.
pub type TextDeltas = SmallVec<[String; 1]>;

/// Pull the assistant text fragments out of one chunk.
///
/// Precedence: an `error` member fails the stream; otherwise the first choice
/// is consulted, preferring `delta.content` (a string, or a list of typed
/// parts of which only `text` parts count) over `message.content`. Empty
/// fragments are dropped.
///
/// # Errors
///
/// Returns [`GatewayError::UpstreamStream`] when the chunk carries a non-null
/// `error` member.
pub fn extract_deltas(chunk: &StreamChunk) -> Result<TextDeltas, GatewayError> {
    let mut out = TextDeltas::new();

    if let Some(error) = chunk.get("error").filter(|e| !e.is_null()) {
        return Err(GatewayError::UpstreamStream(error_message(error)));
    }

    let Some(first) = chunk
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
    else {
        return Ok(out);
    };

    match first.get("delta").and_then(|delta| delta.get("content")) {
        Some(Value::String(text)) => push_text(&mut out, text),
        Some(Value::Array(parts)) => {
            for part in parts {
                if part.get("type").and_then(Value::as_str) == Some("text") {
                    if let Some(text) = part.get("text").and_then(Value::as_str) {
                        push_text(&mut out, text);
                    }
                }
            }
        }
        _ => {
            if let Some(text) = first
                .get("message")
                .and_then(|message| message.get("content"))
                .and_then(Value::as_str)
            {
                push_text(&mut out, text);
            }
        }
    }
    Ok(out)
}

fn push_text(out: &mut TextDeltas, text: &str) {
    if !text.is_empty() {
        out.push(text.to_owned());
    }
}

fn error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_owned),
        other => other.to_string(),
    }
}

/// Stream of text fragments over a [`ChunkStream`].
pub struct TextDeltaStream {
    chunks: ChunkStream,
    pending: VecDeque<String>,
    finished: bool,
}

impl TextDeltaStream {
    #[must_use]
    pub fn new(chunks: ChunkStream) -> Self {
        Self {
            chunks,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Drain the stream into one string.
    ///
    /// # Errors
    ///
    /// Propagates the first stream error.
    pub async fn collect_text(mut self) -> Result<String, GatewayError> {
        use futures_util::StreamExt;

        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }

    fn finish(&mut self) {
        self.finished = true;
        self.pending.clear();
        let chunks = std::mem::replace(&mut self.chunks, ChunkStream::empty());
        chunks.cancel();
    }
}

impl Stream for TextDeltaStream {
    type Item = Result<String, GatewayError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Some(fragment) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(fragment)));
            }
            if this.finished {
                return Poll::Ready(None);
            }
            match Pin::new(&mut this.chunks).poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
                Poll::Ready(Some(Err(err))) => {
                    this.finish();
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(Some(Ok(chunk))) => match extract_deltas(&chunk) {
                    Ok(fragments) => this.pending.extend(fragments),
                    Err(err) => {
                        this.finish();
                        return Poll::Ready(Some(Err(err)));
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use serde_json::json;

    fn deltas(chunk: Value) -> Vec<String> {
        extract_deltas(&chunk).unwrap().into_vec()
    }

    #[test]
    fn test_string_delta() {
        assert_eq!(
            deltas(json!({"choices": [{"delta": {"content": "Hel"}}]})),
            vec!["Hel"]
        );
    }

    #[test]
    fn test_content_parts_keep_text_only() {
        let chunk = json!({"choices": [{"delta": {"content": [
            {"type": "text", "text": "a"},
            {"type": "image", "url": "x"},
            {"type": "text", "text": "b"}
        ]}}]});
        assert_eq!(deltas(chunk), vec!["a", "b"]);
    }

    #[test]
    fn test_message_fallback() {
        let chunk = json!({"choices": [{"message": {"content": "full answer"}}]});
        assert_eq!(deltas(chunk), vec!["full answer"]);

        let chunk = json!({"choices": [{"delta": {"role": "assistant"}, "message": {"content": "m"}}]});
        assert_eq!(deltas(chunk), vec!["m"]);
    }

    #[test]
    fn test_delta_list_wins_over_message() {
        let chunk = json!({"choices": [{"delta": {"content": []}, "message": {"content": "m"}}]});
        assert!(deltas(chunk).is_empty());
    }

    #[test]
    fn test_nothing_to_yield() {
        assert!(deltas(json!({"choices": []})).is_empty());
        assert!(deltas(json!({"usage": {"total_tokens": 4}})).is_empty());
        assert!(deltas(json!({"choices": [{"delta": {"content": ""}}]})).is_empty());
        assert!(deltas(json!({"error": null, "choices": [{"delta": {}}]})).is_empty());
    }

    #[test]
    fn test_error_member_fails() {
        let err = extract_deltas(&json!({"error": {"message": "rate limited"}})).unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamStream(ref m) if m == "rate limited"));

        let err = extract_deltas(&json!({"error": "boom", "choices": []})).unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamStream(ref m) if m == "boom"));
    }

    #[tokio::test]
    async fn test_text_stream_concatenates() {
        let chunks = ChunkStream::new(futures_util::stream::iter(vec![
            Ok(json!({"choices": [{"delta": {"role": "assistant"}}]})),
            Ok(json!({"choices": [{"delta": {"content": "Hel"}}]})),
            Ok(json!({"choices": [{"delta": {"content": [
                {"type": "text", "text": "l"},
                {"type": "text", "text": "o"}
            ]}}]})),
        ]));
        assert_eq!(chunks.text_deltas().collect_text().await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_text_stream_stops_on_error_chunk() {
        let chunks = ChunkStream::new(futures_util::stream::iter(vec![
            Ok(json!({"choices": [{"delta": {"content": "partial"}}]})),
            Ok(json!({"error": {"message": "content filtered"}})),
            Ok(json!({"choices": [{"delta": {"content": "never"}}]})),
        ]));
        let items: Vec<_> = chunks.text_deltas().collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(matches!(items[1], Err(GatewayError::UpstreamStream(_))));
    }
}
