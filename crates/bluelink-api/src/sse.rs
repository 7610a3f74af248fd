//! SSE streaming (§4.2, §6.3): replay from a `Last-Event-ID` cursor, then
//! tail the live broadcaster until a terminal event or client disconnect.

use std::collections::VecDeque;
use std::convert::Infallible;

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use bluelink_core::event::Event;
use bluelink_core::id::EventId;
use futures::stream::{self, Stream};
use tokio::sync::broadcast;

fn frame(event: Event) -> SseEvent {
    SseEvent::default()
        .id(event.id.to_string())
        .event(event.kind.type_name())
        .data(serde_json::to_string(&event.kind).unwrap_or_default())
}

struct StreamState {
    replay: VecDeque<Event>,
    live: broadcast::Receiver<Event>,
    last_id: Option<EventId>,
    done: bool,
}

/// Build the SSE response for a channel: `replay` is every stored event
/// with id greater than the caller's `Last-Event-ID` cursor, `live` is a
/// fresh subscription to the broadcaster taken before replay was read (so
/// no event published in between is lost).
pub fn channel_stream(
    replay: Vec<Event>,
    live: broadcast::Receiver<Event>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let state = StreamState {
        replay: replay.into(),
        live,
        last_id: None,
        done: false,
    };
    let stream = stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        if let Some(event) = state.replay.pop_front() {
            state.last_id = Some(event.id);
            state.done = event.end;
            return Some((Ok(frame(event)), state));
        }
        loop {
            match state.live.recv().await {
                Ok(event) => {
                    // The live subscription was opened before replay was
                    // read, so it may re-deliver events already replayed.
                    if state.last_id.is_some_and(|last| event.id <= last) {
                        continue;
                    }
                    state.last_id = Some(event.id);
                    state.done = event.end;
                    return Some((Ok(frame(event)), state));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
