use super::domain::TimeWindow;

/// Flat platform fee charged on short-notice assignments, in cents.
pub const SHORT_NOTICE_FEE_CENTS: i64 = 300;

/// Labor, fee, and total for one assignment, all in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QuotedTotals {
    pub labor_cents: i64,
    pub fee_cents: i64,
    pub total_cents: i64,
}

/// Billable duration in hours: the window span rounded to two decimals with a
/// one-hour floor. Inverted or zero-length windows bill the floor instead of
/// failing.
pub fn billable_hours(window: &TimeWindow) -> f64 {
    let rounded = (window.duration_hours() * 100.0).round() / 100.0;
    rounded.max(1.0)
}

/// Recompute labor cost and platform fee for an assignment. Pure and
/// bit-reproducible: the same inputs always yield the same totals, which lets
/// reconciliation re-derive what was charged at assignment time.
pub fn recompute(rate_cents_per_hour: i64, duration_hours: f64, short_notice: bool) -> QuotedTotals {
    let labor_cents = ((rate_cents_per_hour as f64) * duration_hours)
        .round()
        .max(0.0) as i64;
    let fee_cents = if short_notice {
        SHORT_NOTICE_FEE_CENTS
    } else {
        0
    };

    QuotedTotals {
        labor_cents,
        fee_cents,
        total_cents: labor_cents + fee_cents,
    }
}
