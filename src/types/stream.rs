//! Streaming types.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{BoxStream, Stream};
use serde::{Deserialize, Serialize};

use super::transcript::ExchangeId;
use crate::error::ChatError;

/// An incremental piece of assistant text, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
}

impl TextChunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl fmt::Display for TextChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Text fragments as decoded by a provider, before session bookkeeping.
pub type TextStream = BoxStream<'static, Result<TextChunk, ChatError>>;

/// The reply to one streamed exchange.
///
/// Yields chunks until the reply ends. A failure is yielded once as the last
/// item. The exchange is committed to history only when the stream ends
/// without error; dropping it early closes the connection and commits nothing.
pub struct ChatStream {
    exchange_id: ExchangeId,
    inner: TextStream,
}

impl ChatStream {
    pub(crate) fn new(exchange_id: ExchangeId, inner: TextStream) -> Self {
        Self { exchange_id, inner }
    }

    /// The transcript entry this stream belongs to.
    pub fn exchange_id(&self) -> ExchangeId {
        self.exchange_id
    }
}

impl Stream for ChatStream {
    type Item = Result<TextChunk, ChatError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatStream")
            .field("exchange_id", &self.exchange_id)
            .finish_non_exhaustive()
    }
}

/// Final result after consuming a chat stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTextResult {
    /// Full accumulated text.
    pub text: String,
    /// Number of chunks received.
    pub chunks: usize,
}
