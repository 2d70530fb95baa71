//! Billing Reconciler
//!
//! Turns a house's reading history and payment records into consecutive
//! 31-day billing periods anchored at account creation. Periods are derived
//! on every query and never stored, so the result is a pure function of its
//! inputs.
//!
//! Consumption per period, first rule that applies:
//!
//! 1. a settled payment with positive locked consumption bills exactly that
//! 2. readings inside the window bill `last - first`
//! 3. a later period with no readings bills `latest - baseline`, where the
//!    baseline is the last reading of the most recent period that had any
//! 4. the first period with no window readings bills the latest cumulative value
//! 5. otherwise zero, which still incurs the minimum charge

use chrono::{DateTime, Datelike, Duration, Utc};
use patak_common::config::BillingConfig;
use patak_common::models::{Account, BillingPeriod, BillingStatus, Payment, Reading};
use patak_common::time::{add_calendar_month, parse_timestamp};
use patak_common::compute_bill;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Length of one billing cycle
pub const CYCLE_DAYS: i64 = 31;

/// Which client the history is rendered for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingView {
    #[default]
    Web,
    Mobile,
}

impl BillingView {
    pub fn cycles(self, config: &BillingConfig) -> usize {
        match self {
            BillingView::Web => config.web_cycles,
            BillingView::Mobile => config.mobile_cycles,
        }
    }
}

/// A reading that can take part in consumption math
#[derive(Debug, Clone, Copy)]
struct Metered {
    at: DateTime<Utc>,
    cubic_meters: f64,
}

/// Billing anchor for a house
///
/// The account creation time when it parses, else the first reading, else
/// `now`.
pub fn anchor_for(account: Option<&Account>, readings: &[Reading], now: DateTime<Utc>) -> DateTime<Utc> {
    if let Some(created) = account.and_then(|a| parse_timestamp(&a.created_at)) {
        return created;
    }
    readings
        .iter()
        .filter_map(Reading::effective_timestamp)
        .min()
        .unwrap_or(now)
}

/// Reconcile `cycles` billing periods starting at `created_at`
pub fn reconcile(
    readings: &[Reading],
    created_at: DateTime<Utc>,
    payments: &[Payment],
    cycles: usize,
    now: DateTime<Utc>,
) -> Vec<BillingPeriod> {
    let mut metered: Vec<Metered> = readings
        .iter()
        .filter(|r| !r.is_test_fixture())
        .filter_map(|r| {
            Some(Metered {
                at: r.effective_timestamp()?,
                cubic_meters: r.cubic_meters?,
            })
        })
        .collect();
    metered.sort_by_key(|m| m.at);

    let latest = metered.last().map(|m| m.cubic_meters).unwrap_or(0.0);
    let first_seen = readings
        .iter()
        .filter(|r| !r.is_test_fixture())
        .filter_map(Reading::effective_timestamp)
        .min();

    let mut baseline = 0.0_f64;
    let mut periods = Vec::with_capacity(cycles);

    for i in 0..cycles {
        let period_start = created_at + Duration::days(CYCLE_DAYS * i as i64);
        let period_end = period_start + Duration::days(CYCLE_DAYS);
        let billing_month = period_start.month();
        let billing_year = period_start.year();

        let window: Vec<&Metered> = metered
            .iter()
            .filter(|m| m.at >= period_start && m.at < period_end)
            .collect();

        let payment = matching_payment(payments, billing_month, billing_year);

        let consumption = if let Some(locked) = payment.and_then(Payment::positive_locked_consumption) {
            if let Some(last) = window.last() {
                baseline = last.cubic_meters;
            }
            locked
        } else if let (Some(first), Some(last)) = (window.first(), window.last()) {
            baseline = last.cubic_meters;
            (last.cubic_meters - first.cubic_meters).max(0.0)
        } else if i > 0 && baseline > 0.0 {
            (latest - baseline).max(0.0)
        } else if i == 0 && !metered.is_empty() {
            latest.max(0.0)
        } else {
            0.0
        };

        let due_date = first_seen.map(add_calendar_month).unwrap_or(period_end);

        let status = if payment.is_some() {
            BillingStatus::Paid
        } else if i == 0 {
            BillingStatus::Current
        } else if now > due_date {
            BillingStatus::Overdue
        } else {
            BillingStatus::Pending
        };

        periods.push(BillingPeriod {
            period_start,
            period_end,
            billing_month,
            billing_year,
            consumption,
            total_consumption: latest,
            amount_due: compute_bill(consumption),
            status,
            due_date,
            payment_date: payment.map(|p| p.payment_date.clone().unwrap_or_else(|| p.created_at.clone())),
        });
    }

    debug!(
        "Reconciled {} periods from {} metered readings and {} payments",
        periods.len(),
        metered.len(),
        payments.len()
    );
    periods
}

/// First settled payment for the billing month, in input order
fn matching_payment(payments: &[Payment], billing_month: u32, billing_year: i32) -> Option<&Payment> {
    let mut matches = payments.iter().filter(|p| p.settles(billing_month, billing_year));
    let first = matches.next()?;
    let extra = matches.count();
    if extra > 0 {
        warn!(
            "Ambiguous reconciliation: {} settled payments for {} {}/{}; using payment {}",
            extra + 1,
            first.user_id,
            billing_month,
            billing_year,
            first.id
        );
    }
    Some(first)
}
