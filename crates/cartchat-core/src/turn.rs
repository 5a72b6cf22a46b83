//! Drives one agent turn from decoded SSE events to a final reply.

use cartchat_types::BotResponse;
use futures_util::{Stream, StreamExt};
use tracing::{debug, info};

use crate::error::ClientResult;
use crate::interpret::{ProgressUpdate, ResponseInterpreter, TurnPhase};
use crate::sse::SseEvent;

/// Receives progress updates while a turn streams.
pub trait ProgressSink {
    fn on_update(&mut self, update: ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: FnMut(ProgressUpdate),
{
    fn on_update(&mut self, update: ProgressUpdate) {
        self(update);
    }
}

/// Sink that drops every update, for callers that only want the result.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl ProgressSink for Discard {
    fn on_update(&mut self, _update: ProgressUpdate) {}
}

/// Feeds every event to a fresh interpreter, forwarding updates to `sink`,
/// and resolves the reply once the stream ends.
///
/// A read failure aborts the turn immediately. An `error` event fails the
/// turn after the remaining events have been drained.
///
/// # Errors
/// Returns the stream error, or a protocol error for an `error` event.
pub async fn interpret_stream<S>(events: S, sink: &mut dyn ProgressSink) -> ClientResult<BotResponse>
where
    S: Stream<Item = ClientResult<SseEvent>>,
{
    let mut events = std::pin::pin!(events);
    let mut interpreter = ResponseInterpreter::new();
    let mut count = 0usize;

    while let Some(event) = events.next().await {
        let event = event?;
        count += 1;
        debug!(event_type = %event.event_type, len = event.data.len(), "sse event");
        for update in interpreter.handle_event(&event) {
            sink.on_update(update);
        }
    }

    if interpreter.phase() == TurnPhase::Failed {
        info!(events = count, "turn failed");
    } else {
        info!(events = count, "turn stream ended");
    }
    interpreter.finish()
}
