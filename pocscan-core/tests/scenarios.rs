//! End-to-end engine scenarios on small hand-checked inputs.

use chrono::NaiveDate;
use pocscan_core::domain::Bar;
use pocscan_core::indicators::{
    build_volume_profile, compute_atr, compute_poc, compute_supertrend, distance_pct,
    within_threshold, AtrMethod, Direction, SupertrendParams,
};
use pocscan_core::ScreenError;

fn day(i: usize) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::days(i as i64)
}

fn bar(i: usize, high: f64, low: f64, close: f64, volume: f64) -> Bar {
    Bar {
        timestamp: day(i),
        open: Some(close),
        high,
        low,
        close,
        volume,
    }
}

/// One bar spanning [8, 10] with a single bin puts all volume at the midpoint.
#[test]
fn single_bar_single_bin_poc_is_midpoint() {
    let bars = [bar(0, 10.0, 8.0, 9.0, 100.0)];
    let poc = compute_poc(&bars, 2).unwrap();
    assert!((poc - 9.0).abs() < 1e-12);
}

/// With five edges the same bar is shared equally across four bins; the first
/// bin wins the tie.
#[test]
fn single_bar_five_edges_shares_equally() {
    let bars = [bar(0, 10.0, 8.0, 9.0, 100.0)];
    let profile = build_volume_profile(&bars, 5).unwrap();
    assert_eq!(profile.volumes(), &[25.0, 25.0, 25.0, 25.0]);
    assert_eq!(profile.price_min(), 8.0);
    assert_eq!(profile.price_max(), 10.0);
    assert!((profile.poc_price() - 8.25).abs() < 1e-12);
}

/// Constant 2-point range and constant close: ATR settles at 2, bands stay flat,
/// the direction never flips.
#[test]
fn constant_range_supertrend_is_stable() {
    let bars: Vec<Bar> = (0..20).map(|i| bar(i, 51.0, 49.0, 50.0, 1000.0)).collect();

    let atr = compute_atr(&bars, 10, AtrMethod::Wilder);
    for v in &atr[10..] {
        assert!((v - 2.0).abs() < 1e-12);
    }

    let series = compute_supertrend(&bars, &SupertrendParams::default()).unwrap();
    assert_eq!(series.first_index(), 10);
    assert!(series.flips().is_empty());
    for s in series.states() {
        assert_eq!(s.direction, Direction::Up);
        assert!((s.final_upper - 56.0).abs() < 1e-12);
        assert!((s.final_lower - 44.0).abs() < 1e-12);
    }
}

/// 105 against a POC of 100 is exactly 5% away: included at a 5% threshold.
#[test]
fn threshold_boundary_is_inclusive() {
    let d = distance_pct(105.0, 100.0);
    assert!((d - 5.0).abs() < 1e-12);
    assert!(within_threshold(d, 5.0));
    assert!(within_threshold(distance_pct(95.0, 100.0), 5.0));
    assert!(!within_threshold(distance_pct(105.01, 100.0), 5.0));
}

#[test]
fn flat_history_has_no_profile() {
    let bars: Vec<Bar> = (0..5).map(|i| bar(i, 7.0, 7.0, 7.0, 10.0)).collect();
    assert_eq!(
        compute_poc(&bars, 200),
        Err(ScreenError::DegenerateRange { price: 7.0 })
    );
}

#[test]
fn volume_free_history_has_no_profile() {
    let bars: Vec<Bar> = (0..5)
        .map(|i| bar(i, 10.0 + i as f64, 9.0, 9.5, 0.0))
        .collect();
    assert_eq!(compute_poc(&bars, 200), Err(ScreenError::NoVolume));
}

#[test]
fn high_volume_cluster_attracts_poc() {
    let mut bars: Vec<Bar> = (0..30)
        .map(|i| bar(i, 120.0, 80.0, 100.0, 1_000.0))
        .collect();
    bars.push(bar(30, 111.0, 109.0, 110.0, 1_000_000.0));
    let poc = compute_poc(&bars, 200).unwrap();
    assert!((109.0..=111.0).contains(&poc), "poc = {poc}");
}
