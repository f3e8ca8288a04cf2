//! Indicator trait.
//!
//! Indicators are pure functions: bar history in, numeric series out.

use crate::domain::Bar;

/// Trait for bar-series indicators.
///
/// Indicators take a full bar series and produce a numeric output series of
/// the same length. Values before `lookback()` are `f64::NAN` (warmup).
///
/// # Look-ahead guard
/// No value at bar t may depend on bars after t: computing over a truncated
/// series must reproduce the prefix of the full-series output.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "atr_10", "supertrend_10_3").
    fn name(&self) -> &str;

    /// Number of bars before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}
