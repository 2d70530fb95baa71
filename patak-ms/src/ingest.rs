//! Ingestion Filter
//!
//! Turns a raw device submission into a normalized [`Reading`], drops known
//! test fixtures, and hands accepted readings to the store and broadcaster.
//!
//! Normalization rules:
//! - `house` is required (string or number), trimmed and lower-cased
//! - `totalLiters` / `cubicMeters` accept numbers or numeric strings; anything
//!   else is treated as absent rather than rejecting the reading
//! - `timestamp` accepts ISO-8601 text or epoch milliseconds; a missing or
//!   unparseable value is replaced by the ingestion time
//! - `receivedAt` is always the ingestion time

use chrono::{DateTime, TimeZone, Utc};
use patak_common::models::Reading;
use patak_common::time::{format_timestamp, is_implausible, parse_timestamp};
use patak_common::{Error, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::broadcaster::Broadcaster;
use crate::store::MeterStore;

/// Result of one submission
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Stored and broadcast
    Accepted(Reading),
    /// Known test fixture; logged and dropped
    Ignored { house: String, reason: &'static str },
}

impl IngestOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, IngestOutcome::Accepted(_))
    }
}

pub struct IngestFilter {
    store: Arc<MeterStore>,
    broadcaster: Arc<Broadcaster>,
}

impl IngestFilter {
    pub fn new(store: Arc<MeterStore>, broadcaster: Arc<Broadcaster>) -> Self {
        Self { store, broadcaster }
    }

    /// Validate, filter, store and broadcast one raw submission
    ///
    /// The store is persisted before this returns. Broadcasting never fails
    /// the submission.
    pub async fn accept(&self, raw: &Value) -> Result<IngestOutcome> {
        let reading = normalize(raw, Utc::now())?;

        if reading.is_test_fixture() {
            info!(
                "Ignored test reading from {}: cubicMeters={:?} totalLiters={:?}",
                reading.house, reading.cubic_meters, reading.total_liters
            );
            return Ok(IngestOutcome::Ignored {
                house: reading.house,
                reason: "test fixture",
            });
        }

        self.store.record(&reading).await?;
        info!(
            "Received reading from {}: cubicMeters={:?} totalLiters={:?}",
            reading.house, reading.cubic_meters, reading.total_liters
        );

        self.broadcaster.publish(&reading).await;
        Ok(IngestOutcome::Accepted(reading))
    }
}

/// Normalize a raw submission received at `received_at`
pub fn normalize(raw: &Value, received_at: DateTime<Utc>) -> Result<Reading> {
    let house = raw
        .get("house")
        .and_then(house_key)
        .ok_or_else(|| Error::Validation("house field required".to_string()))?;

    let timestamp = match raw.get("timestamp").filter(|v| !v.is_null()) {
        None => received_at,
        Some(value) => match device_time(value) {
            Some(ts) => {
                if is_implausible(ts) {
                    warn!(
                        "Clock skew: device timestamp {} from {} is implausible; ordering uses receivedAt",
                        format_timestamp(ts),
                        house
                    );
                }
                ts
            }
            None => {
                warn!("Unparseable timestamp {} from {}; using ingestion time", value, house);
                received_at
            }
        },
    };

    Ok(Reading {
        house,
        device_id: raw
            .get("deviceId")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        total_liters: coerce_number(raw.get("totalLiters")),
        cubic_meters: coerce_number(raw.get("cubicMeters")),
        timestamp: format_timestamp(timestamp),
        received_at: Some(format_timestamp(received_at)),
    })
}

fn house_key(value: &Value) -> Option<String> {
    let key = match value {
        Value::String(s) => s.trim().to_lowercase(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!key.is_empty()).then_some(key)
}

fn coerce_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

fn device_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_house_is_required() {
        assert!(matches!(normalize(&json!({}), at()), Err(Error::Validation(_))));
        assert!(matches!(
            normalize(&json!({"house": "   "}), at()),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            normalize(&json!({"house": null, "cubicMeters": 3}), at()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_house_is_lower_cased() {
        let r = normalize(&json!({"house": " House1 "}), at()).unwrap();
        assert_eq!(r.house, "house1");

        let numeric = normalize(&json!({"house": 7}), at()).unwrap();
        assert_eq!(numeric.house, "7");
    }

    #[test]
    fn test_numeric_coercion() {
        let r = normalize(
            &json!({"house": "h", "totalLiters": "1500", "cubicMeters": 1.5}),
            at(),
        )
        .unwrap();
        assert_eq!(r.total_liters, Some(1500.0));
        assert_eq!(r.cubic_meters, Some(1.5));
    }

    #[test]
    fn test_malformed_numerics_degrade_to_absent() {
        let r = normalize(
            &json!({"house": "h", "totalLiters": "lots", "cubicMeters": {"v": 1}}),
            at(),
        )
        .unwrap();
        assert_eq!(r.total_liters, None);
        assert_eq!(r.cubic_meters, None);

        let nan = normalize(&json!({"house": "h", "cubicMeters": "NaN"}), at()).unwrap();
        assert_eq!(nan.cubic_meters, None);
    }

    #[test]
    fn test_timestamp_defaults_and_normalization() {
        let missing = normalize(&json!({"house": "h"}), at()).unwrap();
        assert_eq!(missing.timestamp, "2026-04-01T12:00:00.000Z");
        assert_eq!(missing.received_at.as_deref(), Some("2026-04-01T12:00:00.000Z"));

        let offset = normalize(
            &json!({"house": "h", "timestamp": "2026-04-01T19:30:00+08:00"}),
            at(),
        )
        .unwrap();
        assert_eq!(offset.timestamp, "2026-04-01T11:30:00.000Z");

        let garbage = normalize(&json!({"house": "h", "timestamp": "yesterday"}), at()).unwrap();
        assert_eq!(garbage.timestamp, "2026-04-01T12:00:00.000Z");

        let millis = normalize(&json!({"house": "h", "timestamp": 0}), at()).unwrap();
        assert_eq!(millis.timestamp, "1970-01-01T00:00:00.000Z");
        // Ordering still uses the server clock
        assert_eq!(millis.effective_timestamp(), Some(at()));
    }

    #[test]
    fn test_fixture_detection_after_coercion() {
        let r = normalize(&json!({"house": "h1", "cubicMeters": "0.1"}), at()).unwrap();
        assert!(r.is_test_fixture());
        let r = normalize(&json!({"house": "h1", "totalLiters": 100}), at()).unwrap();
        assert!(r.is_test_fixture());
    }

    #[test]
    fn test_device_id_is_optional() {
        let r = normalize(&json!({"house": "h", "deviceId": "esp32-01"}), at()).unwrap();
        assert_eq!(r.device_id.as_deref(), Some("esp32-01"));
        let r = normalize(&json!({"house": "h", "deviceId": ""}), at()).unwrap();
        assert_eq!(r.device_id, None);
    }
}
