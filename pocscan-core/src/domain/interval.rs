//! Bar intervals and lookback windows.

use chrono::{Duration, Months, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown interval '{0}' (expected one of 1h, 4h, 1d, 1wk, 1mo)")]
    UnknownInterval(String),

    #[error("invalid lookback '{0}' (expected <n>d, <n>mo, <n>y or max)")]
    InvalidLookback(String),
}

/// Bar interval requested from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Interval {
    Hour1,
    Hour4,
    Day1,
    Week1,
    Month1,
}

impl Interval {
    pub const ALL: [Interval; 5] = [
        Interval::Hour1,
        Interval::Hour4,
        Interval::Day1,
        Interval::Week1,
        Interval::Month1,
    ];

    /// Provider wire code (Yahoo Finance spelling).
    pub fn code(&self) -> &'static str {
        match self {
            Interval::Hour1 => "1h",
            Interval::Hour4 => "4h",
            Interval::Day1 => "1d",
            Interval::Week1 => "1wk",
            Interval::Month1 => "1mo",
        }
    }

    /// History fetched for a SuperTrend reading on this interval.
    ///
    /// Long enough to warm up a default ATR(10) several times over while
    /// staying within what intraday endpoints serve.
    pub fn default_trend_lookback(&self) -> Lookback {
        match self {
            Interval::Hour1 => Lookback::Days(30),
            Interval::Hour4 => Lookback::Days(60),
            Interval::Day1 => Lookback::Months(6),
            Interval::Week1 => Lookback::Years(1),
            Interval::Month1 => Lookback::Years(2),
        }
    }

    pub fn is_intraday(&self) -> bool {
        matches!(self, Interval::Hour1 | Interval::Hour4)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Interval {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim();
        Interval::ALL
            .into_iter()
            .find(|i| i.code() == normalized)
            .ok_or_else(|| ParseError::UnknownInterval(s.to_string()))
    }
}

impl TryFrom<String> for Interval {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.code().to_string()
    }
}

/// Historical duration of bars requested from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Lookback {
    Days(u32),
    Months(u32),
    Years(u32),
    /// All history the provider has.
    Max,
}

impl Lookback {
    /// Earliest timestamp covered by this lookback, counted back from `as_of`.
    ///
    /// `None` for [`Lookback::Max`] or when the subtraction leaves chrono's range.
    pub fn start_from(&self, as_of: NaiveDateTime) -> Option<NaiveDateTime> {
        match *self {
            Lookback::Days(n) => as_of.checked_sub_signed(Duration::days(i64::from(n))),
            Lookback::Months(n) => as_of.checked_sub_months(Months::new(n)),
            Lookback::Years(n) => as_of.checked_sub_months(Months::new(n.saturating_mul(12))),
            Lookback::Max => None,
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookback::Days(n) => write!(f, "{n}d"),
            Lookback::Months(n) => write!(f, "{n}mo"),
            Lookback::Years(n) => write!(f, "{n}y"),
            Lookback::Max => f.write_str("max"),
        }
    }
}

impl FromStr for Lookback {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("max") {
            return Ok(Lookback::Max);
        }
        let invalid = || ParseError::InvalidLookback(s.to_string());
        let split = s.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
        let (digits, unit) = s.split_at(split);
        let n: u32 = digits.parse().map_err(|_| invalid())?;
        if n == 0 {
            return Err(invalid());
        }
        match unit {
            "d" => Ok(Lookback::Days(n)),
            "mo" => Ok(Lookback::Months(n)),
            "y" => Ok(Lookback::Years(n)),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Lookback {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Lookback> for String {
    fn from(value: Lookback) -> Self {
        value.to_string()
    }
}
