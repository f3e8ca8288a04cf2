//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|), undefined at bar 0.
//! Canonical ATR uses Wilder smoothing seeded at index `period` with the mean of
//! TR[1..=period]; each later value folds in the previous bar's true range.
//! Lookback: period.

use serde::{Deserialize, Serialize};

use super::indicator::Indicator;
use crate::domain::Bar;

/// How the ATR series is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtrMethod {
    /// Wilder-smoothed true range. The reference behaviour.
    #[default]
    Wilder,
    /// Simple rolling mean of `high - low`, ignoring gaps against the prior close.
    /// Deprecated approximation, kept for comparing against older screens.
    RollingRange,
}

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    method: AtrMethod,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self::with_method(period, AtrMethod::Wilder)
    }

    pub fn with_method(period: usize, method: AtrMethod) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        let name = match method {
            AtrMethod::Wilder => format!("atr_{period}"),
            AtrMethod::RollingRange => format!("atr_range_{period}"),
        };
        Self {
            period,
            method,
            name,
        }
    }
}

/// Compute the True Range series from bars. TR[0] is NaN (no previous close).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let n = bars.len();
    let mut tr = vec![f64::NAN; n];

    for i in 1..n {
        let h = bars[i].high;
        let l = bars[i].low;
        let pc = bars[i - 1].close;
        if h.is_nan() || l.is_nan() || pc.is_nan() {
            continue;
        }
        tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
    }

    tr
}

/// Wilder-smoothed ATR over a true-range series.
///
/// `ATR[period] = mean(TR[1..=period])`, then
/// `ATR[i] = (ATR[i-1] * (period-1) + TR[i-1]) / period` for `i > period`.
/// A NaN in the seed window leaves the whole series NaN; a NaN after the seed
/// turns every later value NaN.
pub fn wilder_smooth(tr: &[f64], period: usize) -> Vec<f64> {
    let n = tr.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n <= period {
        return result;
    }

    let window = &tr[1..=period];
    if window.iter().any(|v| v.is_nan()) {
        return result;
    }
    let seed = window.iter().sum::<f64>() / period as f64;
    result[period] = seed;

    let p = period as f64;
    let mut prev = seed;
    for i in (period + 1)..n {
        let input = tr[i - 1];
        if input.is_nan() {
            return result;
        }
        let smoothed = (prev * (p - 1.0) + input) / p;
        result[i] = smoothed;
        prev = smoothed;
    }

    result
}

/// Rolling mean of `high - low` over the `period` bars ending at each index,
/// defined from index `period` so both methods share the same first valid bar.
pub fn rolling_range(bars: &[Bar], period: usize) -> Vec<f64> {
    let n = bars.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n <= period {
        return result;
    }

    let ranges: Vec<f64> = bars.iter().map(|b| b.high - b.low).collect();
    for i in period..n {
        let window = &ranges[(i + 1 - period)..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = window.iter().sum::<f64>() / period as f64;
    }
    result
}

/// ATR series for `bars` using the requested method.
pub fn compute_atr(bars: &[Bar], period: usize, method: AtrMethod) -> Vec<f64> {
    match method {
        AtrMethod::Wilder => wilder_smooth(&true_range(bars), period),
        AtrMethod::RollingRange => rolling_range(bars, period),
    }
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        compute_atr(bars, self.period, self.method)
    }
}
