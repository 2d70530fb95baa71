//! Timestamp utilities
//!
//! Readings carry ISO-8601 text as submitted by devices and as persisted.
//! Everything that orders or windows readings goes through these helpers so
//! parsing and formatting stay consistent.

use chrono::{DateTime, Months, SecondsFormat, TimeZone, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp the way it is stored (RFC 3339, millisecond precision, `Z`)
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an ISO-8601 timestamp
///
/// Accepts full RFC 3339 text, naive date-times (taken as UTC) and plain
/// dates (midnight UTC). Returns `None` for anything else.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Add one calendar month, clamping to the last day of a shorter month
/// (Jan 31 + 1 month = Feb 28/29)
pub fn add_calendar_month(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.checked_add_months(Months::new(1)).unwrap_or(ts)
}

/// Earliest device clock value treated as plausible (2000-01-01T00:00:00Z)
pub const PLAUSIBLE_EPOCH_SECS: i64 = 946_684_800;

/// Device clocks that were never set report epoch-zero or similar
pub fn is_implausible(ts: DateTime<Utc>) -> bool {
    ts.timestamp() < PLAUSIBLE_EPOCH_SECS
}
