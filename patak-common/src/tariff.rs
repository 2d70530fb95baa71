//! Residential water tariff
//!
//! | Usage (m³) | Charge                    |
//! |------------|---------------------------|
//! | 0-10       | 255.00 flat minimum       |
//! | 11-20      | 33.00 per m³              |
//! | 21-30      | 40.50 per m³              |
//! | 31-40      | 48.00 per m³              |
//! | 41+        | 55.50 per m³              |
//!
//! Every caller that needs an amount (live summary, billing history, admin
//! tooling) goes through [`compute_bill`].

/// Flat charge covering the first 10 m³
pub const MINIMUM_CHARGE: f64 = 255.0;

/// Usage covered by the minimum charge
pub const FREE_ALLOWANCE: f64 = 10.0;

/// Bounded tiers above the allowance: (width in m³, rate per m³)
const BOUNDED_TIERS: [(f64, f64); 3] = [(10.0, 33.0), (10.0, 40.5), (10.0, 48.0)];

/// Rate for everything past the bounded tiers
const TOP_TIER_RATE: f64 = 55.5;

/// Amount due for `usage` cubic meters, rounded to 2 decimals
///
/// Negative and NaN usage bill as zero usage.
pub fn compute_bill(usage: f64) -> f64 {
    let usage = if usage.is_nan() || usage < 0.0 { 0.0 } else { usage };

    let mut excess = usage - FREE_ALLOWANCE;
    let mut total = MINIMUM_CHARGE;

    for (width, rate) in BOUNDED_TIERS {
        if excess <= 0.0 {
            break;
        }
        let billed = excess.min(width);
        total += billed * rate;
        excess -= billed;
    }

    if excess > 0.0 {
        total += excess * TOP_TIER_RATE;
    }

    round_currency(total)
}

fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_charge_covers_allowance() {
        assert_eq!(compute_bill(0.0), 255.0);
        assert_eq!(compute_bill(7.0), 255.0);
        assert_eq!(compute_bill(10.0), 255.0);
    }

    #[test]
    fn test_documented_amounts() {
        assert_eq!(compute_bill(15.0), 420.0);
        assert_eq!(compute_bill(20.0), 585.0);
        assert_eq!(compute_bill(25.0), 787.5);
        assert_eq!(compute_bill(40.0), 1470.0);
        assert_eq!(compute_bill(45.0), 1747.5);
    }

    #[test]
    fn test_invalid_usage_bills_minimum() {
        assert_eq!(compute_bill(-3.0), MINIMUM_CHARGE);
        assert_eq!(compute_bill(f64::NAN), MINIMUM_CHARGE);
    }

    #[test]
    fn test_rounds_once_at_the_end() {
        // 10.333 m³ -> 255 + 0.333 * 33 = 265.989
        assert_eq!(compute_bill(10.333), 265.99);
        // 10.0001 m³ -> 255.0033
        assert_eq!(compute_bill(10.0001), 255.0);
    }

    #[test]
    fn test_monotonic_over_a_sweep() {
        let mut previous = compute_bill(0.0);
        for step in 1..=1200 {
            let usage = step as f64 * 0.05;
            let amount = compute_bill(usage);
            assert!(
                amount >= previous,
                "compute_bill({usage}) = {amount} < {previous}"
            );
            previous = amount;
        }
    }
}
