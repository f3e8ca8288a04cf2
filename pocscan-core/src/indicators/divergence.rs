//! RSI divergence between swing pivots of price and RSI.
//!
//! A pivot is a value strictly above (swing high) or strictly below (swing
//! low) the `window` values on each side. Only bars that are a pivot of the
//! same kind in both series are compared, and only the last two of them:
//! - bullish: price makes a lower low while RSI makes a higher low, with the
//!   lower RSI under `oversold`
//! - bearish: price makes a higher high while RSI makes a lower high, with the
//!   higher RSI above `overbought`
//!
//! The pair must be at most `max_gap_days` apart and the second pivot at most
//! `max_age_days` before the as-of instant.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::error::ScreenError;
use crate::indicators::rsi::{rma_rsi, Bias};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PivotKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub index: usize,
    pub value: f64,
    pub kind: PivotKind,
}

/// Strict swing highs and lows. The first and last `window` values never pivot.
pub fn find_pivots(values: &[f64], window: usize) -> Vec<Pivot> {
    let n = values.len();
    if window == 0 || n < 2 * window + 1 {
        return Vec::new();
    }

    let mut pivots = Vec::new();
    for i in window..n - window {
        let center = values[i];
        let left = &values[i - window..i];
        let right = &values[i + 1..=i + window];
        let kind = if left.iter().chain(right).all(|v| center > *v) {
            PivotKind::High
        } else if left.iter().chain(right).all(|v| center < *v) {
            PivotKind::Low
        } else {
            continue;
        };
        pivots.push(Pivot {
            index: i,
            value: center,
            kind,
        });
    }
    pivots
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DivergenceParams {
    pub rsi_period: usize,
    pub window: usize,
    pub max_gap_days: i64,
    pub max_age_days: i64,
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for DivergenceParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            window: 2,
            max_gap_days: 42,
            max_age_days: 30,
            oversold: 35.0,
            overbought: 65.0,
        }
    }
}

impl DivergenceParams {
    pub fn validate(&self) -> Result<(), ScreenError> {
        if self.rsi_period == 0 || self.window == 0 {
            return Err(ScreenError::InvalidParameter(
                "divergence rsi_period and window must be >= 1".into(),
            ));
        }
        if self.max_gap_days < 0 || self.max_age_days < 0 {
            return Err(ScreenError::InvalidParameter(
                "divergence day limits must be non-negative".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.oversold)
            || !(0.0..=100.0).contains(&self.overbought)
            || self.oversold >= self.overbought
        {
            return Err(ScreenError::InvalidParameter(format!(
                "divergence RSI levels need 0 <= oversold < overbought <= 100, got {} / {}",
                self.oversold, self.overbought
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DivergencePoint {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub rsi: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub bias: Bias,
    pub first: DivergencePoint,
    pub second: DivergencePoint,
}

/// Check one bias against precomputed RSI values aligned with `bars`.
pub fn detect_divergence(
    bars: &[Bar],
    rsi: &[f64],
    bias: Bias,
    params: &DivergenceParams,
    as_of: NaiveDateTime,
) -> Option<Divergence> {
    if bars.len() != rsi.len() || bars.len() < 2 * params.window + 1 {
        return None;
    }
    let kind = match bias {
        Bias::Bullish => PivotKind::Low,
        Bias::Bearish => PivotKind::High,
    };

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let price_pivots: Vec<usize> = find_pivots(&closes, params.window)
        .into_iter()
        .filter(|p| p.kind == kind)
        .map(|p| p.index)
        .collect();
    let common: Vec<usize> = find_pivots(rsi, params.window)
        .into_iter()
        .filter(|p| p.kind == kind && price_pivots.contains(&p.index))
        .map(|p| p.index)
        .collect();
    let &[.., i1, i2] = common.as_slice() else {
        return None;
    };

    let point = |i: usize| DivergencePoint {
        index: i,
        timestamp: bars[i].timestamp,
        price: closes[i],
        rsi: rsi[i],
    };
    let (first, second) = (point(i1), point(i2));

    if second.timestamp - first.timestamp > Duration::days(params.max_gap_days) {
        return None;
    }
    if as_of - second.timestamp > Duration::days(params.max_age_days) {
        return None;
    }

    let diverges = match bias {
        Bias::Bullish => {
            second.price < first.price
                && second.rsi > first.rsi
                && first.rsi.min(second.rsi) < params.oversold
        }
        Bias::Bearish => {
            second.price > first.price
                && second.rsi < first.rsi
                && first.rsi.max(second.rsi) > params.overbought
        }
    };
    diverges.then_some(Divergence {
        bias,
        first,
        second,
    })
}

/// RSI over `bars`, then both divergence checks. Bullish comes first when both hold.
pub fn rsi_divergences(
    bars: &[Bar],
    params: &DivergenceParams,
    as_of: NaiveDateTime,
) -> Result<Vec<Divergence>, ScreenError> {
    params.validate()?;
    let required = 2 * params.window + 1;
    if bars.len() < required {
        return Err(ScreenError::InsufficientHistory {
            required,
            available: bars.len(),
        });
    }
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let rsi = rma_rsi(&closes, params.rsi_period);
    Ok([Bias::Bullish, Bias::Bearish]
        .into_iter()
        .filter_map(|bias| detect_divergence(bars, &rsi, bias, params, as_of))
        .collect())
}
