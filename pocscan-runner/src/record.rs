//! Screening output rows.

use serde::{Deserialize, Serialize};

use pocscan_core::domain::Interval;
use pocscan_core::indicators::{trend_delta_pct, Direction, DrawdownSummary, SupertrendState};

/// SuperTrend reading on one timeframe. All fields empty when the timeframe failed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendReading {
    pub interval: Interval,
    pub direction: Option<Direction>,
    pub trend_value: Option<f64>,
    pub delta_pct: Option<f64>,
}

impl TrendReading {
    pub fn empty(interval: Interval) -> Self {
        Self {
            interval,
            direction: None,
            trend_value: None,
            delta_pct: None,
        }
    }

    /// Reading from the last SuperTrend state, with delta measured against `price`.
    pub fn from_state(interval: Interval, state: &SupertrendState, price: f64) -> Self {
        Self {
            interval,
            direction: Some(state.direction),
            trend_value: Some(state.trend_value),
            delta_pct: trend_delta_pct(price, state.trend_value),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.direction.is_none()
    }
}

/// One qualifying instrument for one screen. Built once by the screener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningRecord {
    pub symbol: String,
    pub groups: String,
    pub poc: f64,
    pub current_price: f64,
    pub distance_pct: f64,
    pub all_time_high: f64,
    pub max_drawdown_pct: f64,
    pub avg_drawdown_pct: f64,
    pub current_drawdown_pct: f64,
    /// One slot per configured trend interval, in configuration order.
    pub trends: Vec<TrendReading>,
}

impl ScreeningRecord {
    pub fn new(
        symbol: impl Into<String>,
        groups: impl Into<String>,
        poc: f64,
        current_price: f64,
        distance_pct: f64,
        drawdown: DrawdownSummary,
        trends: Vec<TrendReading>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            groups: groups.into(),
            poc,
            current_price,
            distance_pct,
            all_time_high: drawdown.all_time_high,
            max_drawdown_pct: drawdown.max_drawdown_pct,
            avg_drawdown_pct: drawdown.avg_drawdown_pct,
            current_drawdown_pct: drawdown.current_drawdown_pct,
            trends,
        }
    }

    pub fn trend(&self, interval: Interval) -> Option<&TrendReading> {
        self.trends.iter().find(|t| t.interval == interval)
    }
}
