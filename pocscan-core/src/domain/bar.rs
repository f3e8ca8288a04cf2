//! Bar: the fundamental market data unit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for a single instrument at a single timestamp.
///
/// Daily and coarser bars carry a midnight timestamp. `open` is optional because
/// none of the engines read it and some providers omit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: Option<f64>,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Reasons a bar is rejected at the validation boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("non-finite price at {0}")]
    NonFinitePrice(NaiveDateTime),

    #[error("high {high} below low {low} at {timestamp}")]
    HighBelowLow {
        timestamp: NaiveDateTime,
        high: f64,
        low: f64,
    },

    #[error("invalid volume {volume} at {timestamp}")]
    InvalidVolume {
        timestamp: NaiveDateTime,
        volume: f64,
    },
}

impl Bar {
    /// Returns true if any of high/low/close is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Check the invariants every engine relies on: finite prices,
    /// `high >= low`, finite non-negative volume.
    pub fn validate(&self) -> Result<(), BarError> {
        let open_ok = self.open.map_or(true, f64::is_finite);
        if !(self.high.is_finite() && self.low.is_finite() && self.close.is_finite() && open_ok) {
            return Err(BarError::NonFinitePrice(self.timestamp));
        }
        if self.high < self.low {
            return Err(BarError::HighBelowLow {
                timestamp: self.timestamp,
                high: self.high,
                low: self.low,
            });
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(BarError::InvalidVolume {
                timestamp: self.timestamp,
                volume: self.volume,
            });
        }
        Ok(())
    }

    /// Midpoint of the bar's range, `(high + low) / 2`.
    pub fn hl2(&self) -> f64 {
        (self.high + self.low) / 2.0
    }
}
