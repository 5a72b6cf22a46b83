//! Server-Sent-Events framing for agent replies.
//!
//! Turns a byte stream into `(event type, data)` pairs. Framing and
//! incremental UTF-8 decoding come from `eventsource-stream`, so characters
//! split across network chunks decode correctly and an event that was not
//! terminated by a blank line before the stream ended is dropped.

use std::pin::Pin;
use std::task::{Context, Poll};

use eventsource_stream::{EventStream, Eventsource};
use futures_util::Stream;

use crate::error::{ClientError, ClientResult};

/// One decoded SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field (`message` when absent)
    pub event_type: String,
    /// Value of the `data:` field
    pub data: String,
}

impl SseEvent {
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
        }
    }
}

/// SSE reader that converts a byte stream into `SseEvent`s.
///
/// The underlying body is released when the reader is dropped, which also
/// happens on early return from a failed turn.
pub struct SseReader<S> {
    inner: EventStream<S>,
}

impl<S> SseReader<S> {
    pub fn new(stream: S) -> Self
    where
        S: Eventsource,
    {
        Self {
            inner: stream.eventsource(),
        }
    }
}

impl<S, B, E> Stream for SseReader<S>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = ClientResult<SseEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(event))) => {
                Poll::Ready(Some(Ok(SseEvent::new(event.event, event.data))))
            }
            Poll::Ready(Some(Err(e))) => {
                Poll::Ready(Some(Err(ClientError::stream(format!("SSE stream error: {e}")))))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
