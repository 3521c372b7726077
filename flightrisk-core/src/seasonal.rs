//! Seasonal cancellation baseline
//!
//! Approximate historical cancellation percentage for each calendar month at
//! the local airport (BTS on-time data, 2020-2025).

/// Baseline for months outside 1-12
pub const DEFAULT_BASELINE: f64 = 5.0;

/// Baselines above this are surfaced as a named factor
pub const NOTABLE_BASELINE: f64 = 10.0;

const MONTHLY_BASELINES: [f64; 12] = [4.1, 4.8, 0.5, 1.6, 0.7, 0.9, 0.4, 0.9, 0.6, 0.1, 1.7, 5.9];

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Base cancellation rate (%) for a month (1-12)
pub fn seasonal_baseline(month: u32) -> f64 {
    month
        .checked_sub(1)
        .and_then(|i| MONTHLY_BASELINES.get(i as usize))
        .copied()
        .unwrap_or(DEFAULT_BASELINE)
}

pub fn month_name(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|i| MONTH_NAMES.get(i as usize))
        .copied()
        .unwrap_or("Unknown")
}
