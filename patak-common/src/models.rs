//! Domain models shared by the metering service and its clients
//!
//! Field names serialize in camelCase to match what field devices and the
//! existing dashboards exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::parse_timestamp;

/// Cubic-meter value reported by bench test rigs
pub const TEST_FIXTURE_CUBIC_METERS: f64 = 0.1;

/// Total-liter value reported by bench test rigs
pub const TEST_FIXTURE_TOTAL_LITERS: f64 = 100.0;

/// House key reserved for manual testing, never shown to clients
pub const TEST_HOUSE_KEY: &str = "test";

/// True when either value matches a known test-fixture sentinel
pub fn is_test_fixture(cubic_meters: Option<f64>, total_liters: Option<f64>) -> bool {
    cubic_meters == Some(TEST_FIXTURE_CUBIC_METERS) || total_liters == Some(TEST_FIXTURE_TOTAL_LITERS)
}

/// A normalized meter reading
///
/// Timestamps are kept as the ISO-8601 text that was stored so that records
/// written by older deployments (or injected by hand) still load; use
/// [`Reading::effective_timestamp`] whenever a reading has to be ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Lower-cased house key
    pub house: String,

    /// Reporting device, when the device identifies itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_liters: Option<f64>,

    /// Cumulative meter value since installation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cubic_meters: Option<f64>,

    /// Device-reported time
    #[serde(default)]
    pub timestamp: String,

    /// Server ingestion time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<String>,
}

impl Reading {
    /// The timestamp used for every ordering decision
    ///
    /// `receivedAt` is preferred over the device clock; the device timestamp
    /// is only consulted when the server time is missing or unparseable.
    pub fn effective_timestamp(&self) -> Option<DateTime<Utc>> {
        self.received_at
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| parse_timestamp(&self.timestamp))
    }

    /// Raw text of the timestamp [`Reading::effective_timestamp`] would use
    pub fn last_seen(&self) -> Option<&str> {
        match self.received_at.as_deref() {
            Some(raw) if parse_timestamp(raw).is_some() => Some(raw),
            _ if parse_timestamp(&self.timestamp).is_some() => Some(self.timestamp.as_str()),
            _ => None,
        }
    }

    pub fn is_test_fixture(&self) -> bool {
        is_test_fixture(self.cubic_meters, self.total_liters)
    }
}

/// Latest known values for one house
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseSummary {
    #[serde(default)]
    pub total_liters: Option<f64>,
    #[serde(default)]
    pub cubic_meters: Option<f64>,
    #[serde(default)]
    pub last: Option<Reading>,
}

impl HouseSummary {
    /// Replace the summary with a newer reading
    ///
    /// Numeric fields are only overwritten when the reading carries them.
    pub fn apply(&mut self, reading: &Reading) {
        if reading.total_liters.is_some() {
            self.total_liters = reading.total_liters;
        }
        if reading.cubic_meters.is_some() {
            self.cubic_meters = reading.cubic_meters;
        }
        self.last = Some(reading.clone());
    }

    /// Current cubic meters, falling back to the last reading
    pub fn current_cubic_meters(&self) -> Option<f64> {
        self.cubic_meters
            .or_else(|| self.last.as_ref().and_then(|r| r.cubic_meters))
    }

    /// Current total liters, falling back to the last reading
    pub fn current_total_liters(&self) -> Option<f64> {
        self.total_liters
            .or_else(|| self.last.as_ref().and_then(|r| r.total_liters))
    }
}

/// Payment lifecycle status
///
/// `confirmed` and `PAID` are written by older payment collaborators and are
/// treated as settled alongside `verified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[serde(rename = "pending_verification")]
    PendingVerification,
    #[serde(rename = "verified")]
    Verified,
    #[serde(rename = "confirmed")]
    Confirmed,
    #[serde(rename = "PAID")]
    Paid,
    #[serde(rename = "rejected")]
    Rejected,
}

impl PaymentStatus {
    /// Whether the payment settles its billing period
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Verified | Self::Confirmed | Self::Paid)
    }
}

/// A payment submitted against one billing month of a house account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    /// House account the payment settles
    pub user_id: String,
    pub amount: f64,
    /// 1-12
    pub billing_month: u32,
    pub billing_year: i32,
    pub reference_number: String,
    pub status: PaymentStatus,
    /// Consumption frozen at verification time; authoritative for the period
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_consumption: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<String>,
    pub created_at: String,
}

impl Payment {
    /// Matches a billing month with a settling status
    pub fn settles(&self, billing_month: u32, billing_year: i32) -> bool {
        self.billing_month == billing_month
            && self.billing_year == billing_year
            && self.status.is_settled()
    }

    /// Locked consumption, if present and positive
    pub fn positive_locked_consumption(&self) -> Option<f64> {
        self.locked_consumption.filter(|v| *v > 0.0)
    }
}

/// Billing anchor for a house
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub house: String,
    pub created_at: String,
}

/// Status of a reconciled billing period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingStatus {
    Current,
    Pending,
    Paid,
    Overdue,
}

/// One reconciled billing period (derived on every query, never stored)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingPeriod {
    pub period_start: DateTime<Utc>,
    /// Exclusive end of the window
    pub period_end: DateTime<Utc>,
    pub billing_month: u32,
    pub billing_year: i32,
    /// Cubic meters billed for this period
    pub consumption: f64,
    /// Latest cumulative meter value known for the house
    pub total_consumption: f64,
    pub amount_due: f64,
    pub status: BillingStatus,
    pub due_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reading(received_at: Option<&str>, timestamp: &str) -> Reading {
        Reading {
            house: "h1".to_string(),
            device_id: None,
            total_liters: Some(1500.0),
            cubic_meters: Some(1.5),
            timestamp: timestamp.to_string(),
            received_at: received_at.map(str::to_string),
        }
    }

    #[test]
    fn test_effective_timestamp_prefers_received_at() {
        let r = reading(Some("2026-05-01T10:00:00Z"), "1970-01-01T00:00:00Z");
        let ts = r.effective_timestamp().unwrap();
        assert_eq!(crate::time::format_timestamp(ts), "2026-05-01T10:00:00.000Z");
        assert_eq!(r.last_seen(), Some("2026-05-01T10:00:00Z"));
    }

    #[test]
    fn test_effective_timestamp_falls_back_to_device_time() {
        let r = reading(Some("garbage"), "2026-05-01T09:00:00Z");
        let ts = r.effective_timestamp().unwrap();
        assert_eq!(crate::time::format_timestamp(ts), "2026-05-01T09:00:00.000Z");
        assert_eq!(r.last_seen(), Some("2026-05-01T09:00:00Z"));

        let none = reading(None, "also garbage");
        assert!(none.effective_timestamp().is_none());
        assert!(none.last_seen().is_none());
    }

    #[test]
    fn test_test_fixture_sentinels() {
        assert!(is_test_fixture(Some(0.1), None));
        assert!(is_test_fixture(None, Some(100.0)));
        assert!(is_test_fixture(Some(3.0), Some(100.0)));
        assert!(!is_test_fixture(Some(0.11), Some(101.0)));
        assert!(!is_test_fixture(None, None));
    }

    #[test]
    fn test_summary_apply_keeps_missing_numerics() {
        let mut summary = HouseSummary::default();
        summary.apply(&reading(Some("2026-05-01T10:00:00Z"), ""));

        let mut partial = reading(Some("2026-05-01T10:01:00Z"), "");
        partial.total_liters = None;
        partial.cubic_meters = Some(2.0);
        summary.apply(&partial);

        assert_eq!(summary.total_liters, Some(1500.0));
        assert_eq!(summary.cubic_meters, Some(2.0));
        assert_eq!(summary.last.as_ref(), Some(&partial));
    }

    #[test]
    fn test_payment_status_wire_names() {
        let p: Payment = serde_json::from_value(json!({
            "id": "p-1",
            "userId": "house1",
            "amount": 255.0,
            "billingMonth": 3,
            "billingYear": 2026,
            "referenceNumber": "GC-1",
            "status": "PAID",
            "createdAt": "2026-03-02T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(p.status, PaymentStatus::Paid);
        assert!(p.settles(3, 2026));
        assert!(!p.settles(4, 2026));

        let pending = PaymentStatus::PendingVerification;
        assert_eq!(serde_json::to_value(pending).unwrap(), json!("pending_verification"));
        assert!(!pending.is_settled());
        assert!(!PaymentStatus::Rejected.is_settled());
    }

    #[test]
    fn test_locked_consumption_must_be_positive() {
        let mut p: Payment = serde_json::from_value(json!({
            "id": "p-2",
            "userId": "house1",
            "amount": 300.0,
            "billingMonth": 1,
            "billingYear": 2026,
            "referenceNumber": "GC-2",
            "status": "verified",
            "lockedConsumption": 0.0,
            "createdAt": "2026-01-02T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(p.positive_locked_consumption(), None);
        p.locked_consumption = Some(12.5);
        assert_eq!(p.positive_locked_consumption(), Some(12.5));
    }
}
