//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE conversions so every Patak service frames meter events the
//! same way.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::warn;

use crate::events::MeterEvent;

/// Convert a meter event into an SSE frame
///
/// Returns `None` (and logs) when the payload cannot be serialized; the
/// subscriber simply misses that one frame.
pub fn to_sse_event(event: &MeterEvent) -> Option<Event> {
    let payload = match event.payload() {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Failed to serialize {} event: {}", event.event_name(), e);
            return None;
        }
    };

    match Event::default().event(event.event_name()).json_data(payload) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!("Failed to frame {} event: {}", event.event_name(), e);
            None
        }
    }
}

/// Wrap an event stream in an SSE response with periodic keep-alive comments
///
/// # Example
/// ```rust,ignore
/// pub async fn event_stream(
///     State(state): State<AppState>,
/// ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
///     patak_common::sse::with_keep_alive(state.broadcaster.subscribe(), 15)
/// }
/// ```
pub fn with_keep_alive<S>(stream: S, interval_secs: u64) -> Sse<S>
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(interval_secs.max(1)))
            .text("keep-alive"),
    )
}
