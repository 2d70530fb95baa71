//! Event types for the Patak real-time stream
//!
//! Every accepted reading produces a `reading` event followed by a `summary`
//! event. New subscribers get a `summary` event first so they never start
//! blank.

use serde::Serialize;
use serde_json::Value;

use crate::models::Reading;

/// Events pushed to live dashboard subscribers
///
/// The summary payload is already projected (visibility filtering and
/// liveness applied) by the service, so it travels as JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum MeterEvent {
    /// A newly accepted reading, exactly as stored
    Reading(Reading),

    /// Full projected summary, wire shape `{"summary": {...}}`
    Summary(Value),
}

/// Wire shape of the `summary` event payload
#[derive(Debug, Serialize)]
struct SummaryPayload<'a> {
    summary: &'a Value,
}

impl MeterEvent {
    /// SSE `event:` field value
    pub fn event_name(&self) -> &'static str {
        match self {
            MeterEvent::Reading(_) => "reading",
            MeterEvent::Summary(_) => "summary",
        }
    }

    /// JSON carried in the SSE `data:` field
    pub fn payload(&self) -> serde_json::Result<Value> {
        match self {
            MeterEvent::Reading(reading) => serde_json::to_value(reading),
            MeterEvent::Summary(summary) => serde_json::to_value(SummaryPayload { summary }),
        }
    }
}
