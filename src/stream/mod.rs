pub mod delta;
pub mod sse;

pub use delta::{extract_deltas, TextDeltaStream, TextDeltas};
pub use sse::{classify_line, decode_lines, SseChunkStream, SseFrame};

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;

use crate::error::GatewayError;

/// One decoded JSON value from a backend event stream.
pub type StreamChunk = serde_json::Value;

type BoxedChunks = Pin<Box<dyn Stream<Item = Result<StreamChunk, GatewayError>> + Send>>;

/// Lazy, single-consumer sequence of [`StreamChunk`]s.
///
/// The sequence ends after the terminal sentinel, after the first error, or
/// when the backend closes the connection. Dropping the stream (or calling
/// [`ChunkStream::cancel`]) releases the underlying connection.
pub struct ChunkStream {
    inner: Option<BoxedChunks>,
}

impl ChunkStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<StreamChunk, GatewayError>> + Send + 'static,
    {
        Self {
            inner: Some(Box::pin(stream)),
        }
    }

    /// A stream that yields nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self { inner: None }
    }

    /// A stream that yields exactly one chunk.
    #[must_use]
    pub fn once(chunk: StreamChunk) -> Self {
        Self::new(futures_util::stream::once(async move { Ok(chunk) }))
    }

    /// Stop consuming and release the connection.
    pub fn cancel(mut self) {
        self.inner = None;
    }

    /// True once the sequence has ended or been cancelled.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.inner.is_none()
    }

    /// Adapt into a stream of assistant text fragments.
    #[must_use]
    pub fn text_deltas(self) -> TextDeltaStream {
        TextDeltaStream::new(self)
    }
}

impl Stream for ChunkStream {
    type Item = Result<StreamChunk, GatewayError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Ready(None);
        };
        let polled = inner.as_mut().poll_next(cx);
        if matches!(polled, Poll::Ready(None) | Poll::Ready(Some(Err(_)))) {
            self.inner = None;
        }
        polled
    }
}

impl std::fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStream")
            .field("terminated", &self.is_terminated())
            .finish()
    }
}
