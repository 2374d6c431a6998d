use super::common::*;
use crate::matching::domain::TimeWindow;
use crate::matching::pricing::{billable_hours, recompute, SHORT_NOTICE_FEE_CENTS};

#[test]
fn short_notice_assignment_adds_the_flat_fee() {
    let totals = recompute(2000, 2.5, true);
    assert_eq!(totals.labor_cents, 5000);
    assert_eq!(totals.fee_cents, SHORT_NOTICE_FEE_CENTS);
    assert_eq!(totals.total_cents, 5300);
}

#[test]
fn standard_assignment_carries_no_fee() {
    let totals = recompute(2000, 2.5, false);
    assert_eq!(totals.labor_cents, 5000);
    assert_eq!(totals.fee_cents, 0);
    assert_eq!(totals.total_cents, 5000);
}

#[test]
fn billable_hours_round_to_two_decimals() {
    let window = window_hours(1.3333);
    assert_eq!(billable_hours(&window), 1.33);
}

#[test]
fn sub_hour_windows_bill_the_one_hour_floor() {
    let window = window_hours(0.5);
    assert_eq!(billable_hours(&window), 1.0);
}

#[test]
fn inverted_window_defaults_to_one_hour() {
    let valid = window_hours(2.0);
    let inverted = TimeWindow {
        start: valid.end,
        end: valid.start,
    };
    assert_eq!(billable_hours(&inverted), 1.0);

    let totals = recompute(2000, billable_hours(&inverted), true);
    assert_eq!(totals.labor_cents, 2000);
}

#[test]
fn labor_never_goes_negative() {
    let totals = recompute(-500, 2.0, false);
    assert_eq!(totals.labor_cents, 0);
    assert_eq!(totals.total_cents, 0);
}

#[test]
fn recompute_is_reproducible() {
    let first = recompute(1850, 3.25, true);
    for _ in 0..10 {
        assert_eq!(recompute(1850, 3.25, true), first);
    }
}

#[test]
fn fractional_labor_rounds_to_whole_cents() {
    // 1850 * 1.33 = 2460.5, rounds to 2461.
    let totals = recompute(1850, 1.33, false);
    assert_eq!(totals.labor_cents, 2461);
}
