//! Key reversal bars.
//!
//! Bar i is a bullish key reversal when its low undercuts the lowest low of the
//! `lookback` bars before it, it closes above the previous close, and RSI is
//! below `oversold`. Bearish is the mirror image: a high above the prior
//! `lookback` highs, a lower close, and RSI above `overbought`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::error::ScreenError;
use crate::indicators::rsi::{rma_rsi, Bias};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyReversalParams {
    /// Prior bars whose extreme low/high must be broken.
    pub lookback: usize,
    pub rsi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for KeyReversalParams {
    fn default() -> Self {
        Self {
            lookback: 2,
            rsi_period: 9,
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

impl KeyReversalParams {
    pub fn validate(&self) -> Result<(), ScreenError> {
        if self.lookback == 0 {
            return Err(ScreenError::InvalidParameter(
                "key reversal lookback must be >= 1".into(),
            ));
        }
        if self.rsi_period == 0 {
            return Err(ScreenError::InvalidParameter(
                "key reversal rsi_period must be >= 1".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.oversold)
            || !(0.0..=100.0).contains(&self.overbought)
            || self.oversold >= self.overbought
        {
            return Err(ScreenError::InvalidParameter(format!(
                "key reversal RSI levels need 0 <= oversold < overbought <= 100, got {} / {}",
                self.oversold, self.overbought
            )));
        }
        Ok(())
    }

    /// First bar index at which both the range lookback and the RSI are defined.
    pub fn first_index(&self) -> usize {
        self.lookback.max(self.rsi_period)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyReversal {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub bias: Bias,
    pub close: f64,
    pub rsi: f64,
}

/// Every key reversal bar in `bars`, oldest first.
pub fn key_reversals(
    bars: &[Bar],
    params: &KeyReversalParams,
) -> Result<Vec<KeyReversal>, ScreenError> {
    params.validate()?;
    let first = params.first_index();
    if bars.len() <= first {
        return Err(ScreenError::InsufficientHistory {
            required: first + 1,
            available: bars.len(),
        });
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let rsi = rma_rsi(&closes, params.rsi_period);

    let mut out = Vec::new();
    for i in first..bars.len() {
        let bar = &bars[i];
        let prior = &bars[i - params.lookback..i];
        let prior_low = prior.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let prior_high = prior.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let prev_close = bars[i - 1].close;
        let r = rsi[i];
        if !r.is_finite() {
            continue;
        }

        let bias = if bar.low < prior_low && bar.close > prev_close && r < params.oversold {
            Bias::Bullish
        } else if bar.high > prior_high && bar.close < prev_close && r > params.overbought {
            Bias::Bearish
        } else {
            continue;
        };
        out.push(KeyReversal {
            index: i,
            timestamp: bar.timestamp,
            bias,
            close: bar.close,
            rsi: r,
        });
    }
    Ok(out)
}
