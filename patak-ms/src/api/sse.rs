//! Live update stream

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use tracing::debug;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Sent by the dashboards; accepted but not checked
    #[serde(default)]
    pub token: Option<String>,
}

/// GET /api/stream
///
/// Streams `summary` (first, then after every reading) and `reading` events.
pub async fn event_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!(
        "Stream subscriber connecting (token supplied: {})",
        query.token.is_some()
    );
    patak_common::sse::with_keep_alive(
        state.broadcaster.subscribe(),
        state.config.live.keep_alive_secs,
    )
}
