//! Summary Projector
//!
//! Builds the client-facing view of the per-house summary index: merges keys
//! that differ only by case, hides test data, and adds liveness and the
//! amount due right now.

use chrono::{DateTime, Duration, Utc};
use patak_common::models::{is_test_fixture, HouseSummary, Reading, TEST_HOUSE_KEY};
use patak_common::compute_bill;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// One house as shown to dashboards
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedHouse {
    pub total_liters: Option<f64>,
    pub cubic_meters: Option<f64>,
    pub last: Option<Reading>,
    pub online: bool,
    pub last_seen: Option<String>,
    pub amount_due: f64,
}

#[derive(Debug, Clone)]
pub struct SummaryProjector {
    online_window: Duration,
}

impl SummaryProjector {
    pub fn new(online_window_secs: u64) -> Self {
        Self {
            online_window: Duration::seconds(online_window_secs.min(u32::MAX as u64) as i64),
        }
    }

    /// Project the raw summary index at `now`
    pub fn project(
        &self,
        summary: &BTreeMap<String, HouseSummary>,
        now: DateTime<Utc>,
    ) -> BTreeMap<String, ProjectedHouse> {
        merge_case_insensitive(summary)
            .into_iter()
            .map(|(house, entry)| {
                let projected = self.project_one(&entry, now);
                (house, projected)
            })
            .collect()
    }

    fn project_one(&self, entry: &HouseSummary, now: DateTime<Utc>) -> ProjectedHouse {
        let seen = entry.last.as_ref().and_then(Reading::effective_timestamp);
        let cubic_meters = entry.current_cubic_meters();

        ProjectedHouse {
            total_liters: entry.current_total_liters(),
            cubic_meters,
            last: entry.last.clone(),
            online: seen.is_some_and(|ts| now - ts < self.online_window),
            last_seen: entry
                .last
                .as_ref()
                .and_then(|r| r.last_seen())
                .map(str::to_string),
            amount_due: compute_bill(cubic_meters.unwrap_or(0.0)),
        }
    }
}

fn visible(house: &str, entry: &HouseSummary) -> bool {
    if house == TEST_HOUSE_KEY {
        return false;
    }
    if is_test_fixture(entry.current_cubic_meters(), entry.current_total_liters()) {
        debug!("Hiding test fixture values for house {}", house);
        return false;
    }
    true
}

/// Collapse raw keys onto their lower-case form
///
/// Test data is dropped per raw entry before merging, so a stale fixture
/// under one spelling never hides real data under another. The entry whose
/// last reading is strictly newer wins; on a tie the first key stays. When
/// either side has no parseable timestamp the later key in iteration order
/// overwrites.
fn merge_case_insensitive(
    summary: &BTreeMap<String, HouseSummary>,
) -> BTreeMap<String, HouseSummary> {
    let mut merged: BTreeMap<String, HouseSummary> = BTreeMap::new();

    for (raw_key, entry) in summary {
        let key = raw_key.trim().to_lowercase();
        if !visible(&key, entry) {
            continue;
        }
        let replace = match merged.get(&key) {
            None => true,
            Some(existing) => {
                let existing_ts = existing.last.as_ref().and_then(Reading::effective_timestamp);
                let incoming_ts = entry.last.as_ref().and_then(Reading::effective_timestamp);
                match (existing_ts, incoming_ts) {
                    (Some(existing_ts), Some(incoming_ts)) => incoming_ts > existing_ts,
                    _ => true,
                }
            }
        };
        if replace {
            merged.insert(key, entry.clone());
        }
    }

    merged
}
