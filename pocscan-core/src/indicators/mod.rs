//! Numeric engines.
//!
//! - `atr` / `supertrend`: ATR bands and the sequential trend state machine
//! - `volume_profile`: price-binned volume histogram and point of control
//! - `drawdown`: running-peak drawdown statistics
//! - `rsi`, `key_reversal`, `divergence`: weekly RSI signal screens
//!
//! `Atr`, `Rsi` and `Supertrend` also implement the single-series `Indicator` trait.

pub mod atr;
pub mod divergence;
pub mod drawdown;
pub mod indicator;
pub mod key_reversal;
pub mod rsi;
pub mod supertrend;
pub mod volume_profile;

pub use atr::{compute_atr, true_range, wilder_smooth, Atr, AtrMethod};
pub use divergence::{
    detect_divergence, find_pivots, rsi_divergences, Divergence, DivergenceParams,
    DivergencePoint, Pivot, PivotKind,
};
pub use drawdown::{compute_drawdown, drawdown_series, DrawdownSummary};
pub use indicator::Indicator;
pub use key_reversal::{key_reversals, KeyReversal, KeyReversalParams};
pub use rsi::{rma_rsi, Bias, Rsi};
pub use supertrend::{
    compute_supertrend, trend_delta_pct, Direction, SeedDirection, Supertrend, SupertrendParams,
    SupertrendSeries, SupertrendState,
};
pub use volume_profile::{
    build_volume_profile, compute_poc, distance_pct, within_threshold, VolumeProfile,
};

/// Create synthetic daily bars from (open, high, low, close) tuples for testing.
#[cfg(test)]
pub fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar {
            timestamp: base + chrono::Duration::days(i as i64),
            open: Some(open),
            high,
            low,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Create synthetic daily bars from (high, low, volume) tuples; close is the midpoint.
#[cfg(test)]
pub fn make_hlv_bars(data: &[(f64, f64, f64)]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(high, low, volume))| Bar {
            timestamp: base + chrono::Duration::days(i as i64),
            open: None,
            high,
            low,
            close: (high + low) / 2.0,
            volume,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
