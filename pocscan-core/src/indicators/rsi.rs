//! Relative Strength Index (RSI), RMA-smoothed.
//!
//! avg_gain and avg_loss are running moving averages with alpha = 1/period,
//! seeded by the first close-to-close change (TradingView / pandas
//! `ewm(alpha=1/period, adjust=False)`).
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Edge cases: avg_loss == 0 → RSI = 100; avg_gain == 0 → RSI = 0; no movement → 50.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::indicators::Indicator;

/// Direction a reversal or divergence signal points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    Bullish,
    Bearish,
}

impl Bias {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bias::Bullish => "bullish",
            Bias::Bearish => "bearish",
        }
    }
}

impl std::fmt::Display for Bias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RSI of every close, NaN at index 0 and wherever a change is non-finite.
///
/// A non-finite change resets nothing: every later value is NaN too.
pub fn rma_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < 2 {
        return result;
    }

    let alpha = 1.0 / period as f64;
    let mut avg_gain = f64::NAN;
    let mut avg_loss = f64::NAN;
    for i in 1..n {
        let change = closes[i] - closes[i - 1];
        if !change.is_finite() {
            return result;
        }
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        if i == 1 {
            avg_gain = gain;
            avg_loss = loss;
        } else {
            avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
            avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
        }
        result[i] = rsi_value(avg_gain, avg_loss);
    }
    result
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// RSI as an [`Indicator`]: values before `period` are NaN (warmup).
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let mut values = rma_rsi(&closes, self.period);
        for v in values.iter_mut().take(self.period) {
            *v = f64::NAN;
        }
        values
    }
}
