//! Look-ahead contamination tests for the per-bar engines.
//!
//! No value at bar t may depend on price data from bar t+1 or later.
//!
//! Method: compute on a truncated series (bars 0..100) and the full series
//! (bars 0..200). Bars 0..100 must be identical between both runs.

use chrono::NaiveDate;
use pocscan_core::domain::Bar;
use pocscan_core::indicators::*;

/// N bars of deterministic pseudo-random OHLCV data.
fn make_test_bars(n: usize) -> Vec<Bar> {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut bars = Vec::with_capacity(n);
    let mut price = 100.0;

    for i in 0..n {
        let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
        let change = ((seed % 200) as f64 - 100.0) * 0.05;
        price = (price + change).max(10.0);

        let open = price - 0.5;
        let close = price + 0.3;
        bars.push(Bar {
            timestamp: base + chrono::Duration::days(i as i64),
            open: Some(open),
            high: open.max(close) + 2.0,
            low: open.min(close) - 2.0,
            close,
            volume: 1000.0 + i as f64 * 100.0,
        });
    }
    bars
}

fn assert_prefix_equal(name: &str, truncated: &[f64], full: &[f64]) {
    for (i, (t, f)) in truncated.iter().zip(full).enumerate() {
        if t.is_nan() && f.is_nan() {
            continue;
        }
        assert!(
            !t.is_nan() && !f.is_nan(),
            "{name}: NaN mismatch at bar {i} (truncated={t}, full={f})"
        );
        assert!(
            (t - f).abs() < 1e-10,
            "{name}: look-ahead contamination at bar {i}: truncated={t}, full={f}"
        );
    }
}

fn assert_no_lookahead(indicator: &dyn Indicator, full_bars: &[Bar], truncated_len: usize) {
    let truncated = indicator.compute(&full_bars[..truncated_len]);
    let full = indicator.compute(full_bars);
    assert_eq!(truncated.len(), truncated_len, "{}", indicator.name());
    assert_eq!(full.len(), full_bars.len(), "{}", indicator.name());
    assert_prefix_equal(indicator.name(), &truncated, &full[..truncated_len]);
}

#[test]
fn lookahead_atr() {
    let bars = make_test_bars(200);
    assert_no_lookahead(&Atr::new(14), &bars, 100);
    assert_no_lookahead(&Atr::new(5), &bars, 100);
    assert_no_lookahead(&Atr::with_method(10, AtrMethod::RollingRange), &bars, 100);
}

#[test]
fn lookahead_supertrend() {
    let bars = make_test_bars(200);
    assert_no_lookahead(&Supertrend::new(10, 3.0), &bars, 100);
    assert_no_lookahead(&Supertrend::new(7, 2.0), &bars, 100);
}

#[test]
fn supertrend_directions_do_not_depend_on_future_bars() {
    let bars = make_test_bars(200);
    let params = SupertrendParams::default();
    let short = compute_supertrend(&bars[..100], &params).unwrap();
    let long = compute_supertrend(&bars, &params).unwrap();
    assert_eq!(short.states(), &long.states()[..short.states().len()]);
}

#[test]
fn lookahead_drawdown() {
    let closes: Vec<f64> = make_test_bars(200).iter().map(|b| b.close).collect();
    let truncated = drawdown_series(&closes[..100]).unwrap();
    let full = drawdown_series(&closes).unwrap();
    assert_prefix_equal("drawdown", &truncated, &full[..100]);
}
