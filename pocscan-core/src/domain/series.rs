//! BarSeries: a validated, time-ordered run of bars for one (symbol, interval).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::bar::{Bar, BarError};
use super::interval::Interval;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("series for '{symbol}' is empty")]
    Empty { symbol: String },

    #[error("timestamps not strictly increasing at index {index} ({timestamp})")]
    Unordered {
        index: usize,
        timestamp: NaiveDateTime,
    },

    #[error("invalid bar at index {index}: {source}")]
    InvalidBar {
        index: usize,
        #[source]
        source: BarError,
    },
}

/// Ordered bars for a single instrument on a single interval.
///
/// Only constructible through [`BarSeries::new`], which enforces non-emptiness,
/// strictly increasing timestamps and per-bar validity. Engines can therefore
/// index the first and last bar freely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    symbol: String,
    interval: Interval,
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(
        symbol: impl Into<String>,
        interval: Interval,
        bars: Vec<Bar>,
    ) -> Result<Self, SeriesError> {
        let symbol = symbol.into();
        if bars.is_empty() {
            return Err(SeriesError::Empty { symbol });
        }
        for (index, bar) in bars.iter().enumerate() {
            bar.validate()
                .map_err(|source| SeriesError::InvalidBar { index, source })?;
            if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
                return Err(SeriesError::Unordered {
                    index,
                    timestamp: bar.timestamp,
                });
            }
        }
        Ok(Self {
            symbol,
            interval,
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false; kept for API symmetry with slices.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last_close(&self) -> f64 {
        self.bars[self.bars.len() - 1].close
    }

    pub fn first_timestamp(&self) -> NaiveDateTime {
        self.bars[0].timestamp
    }

    pub fn last_timestamp(&self) -> NaiveDateTime {
        self.bars[self.bars.len() - 1].timestamp
    }

    /// Bars at or after `start`, or `None` if nothing remains.
    pub fn since(&self, start: NaiveDateTime) -> Option<BarSeries> {
        let from = self.bars.partition_point(|b| b.timestamp < start);
        if from == self.bars.len() {
            return None;
        }
        Some(BarSeries {
            symbol: self.symbol.clone(),
            interval: self.interval,
            bars: self.bars[from..].to_vec(),
        })
    }
}
