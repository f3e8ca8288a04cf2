//! Bar provider trait and structured error types.
//!
//! `BarProvider` abstracts over data sources (Yahoo Finance, CSV directory,
//! synthetic) so the orchestrator can swap implementations and mock for tests.
//! Providers return raw bars; the validation boundary lives in `ingest`.

use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Interval, Lookback};

/// Raw OHLCV bar from a provider, before validation.
///
/// Missing prices are NaN, missing volume is 0. Ordering and uniqueness of
/// timestamps are not guaranteed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub timestamp: NaiveDateTime,
    pub open: Option<f64>,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Whether prices should be split/dividend adjusted by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceAdjustment {
    #[default]
    Raw,
    Adjusted,
}

/// One request for bars: symbol, lookback window ending at `as_of`, interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub symbol: String,
    pub lookback: Lookback,
    pub interval: Interval,
    pub as_of: NaiveDateTime,
    pub adjustment: PriceAdjustment,
}

impl FetchRequest {
    pub fn new(
        symbol: impl Into<String>,
        lookback: Lookback,
        interval: Interval,
        as_of: NaiveDateTime,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            lookback,
            interval,
            as_of,
            adjustment: PriceAdjustment::Raw,
        }
    }

    pub fn adjusted(mut self) -> Self {
        self.adjustment = PriceAdjustment::Adjusted;
        self
    }

    /// Earliest timestamp the request covers (`None` for `max`).
    pub fn start(&self) -> Option<NaiveDateTime> {
        self.lookback.start_from(self.as_of)
    }
}

impl std::fmt::Display for FetchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}@{}", self.symbol, self.lookback, self.interval)
    }
}

/// Structured error types for data operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("no bars returned for '{symbol}'")]
    Empty { symbol: String },

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("{provider} does not serve interval {interval}")]
    UnsupportedInterval { provider: String, interval: Interval },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataError::NetworkUnreachable(_) | DataError::RateLimited { .. } | DataError::Other(_)
        )
    }
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    YahooFinance,
    CsvImport,
    Synthetic,
}

/// Trait for bar providers.
///
/// Shared by all worker threads of a batch, hence `Send + Sync`. Any error or
/// empty result means "no data" for that request only.
pub trait BarProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    fn source(&self) -> DataSource;

    /// Fetch raw bars for one request.
    fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawBar>, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool {
        true
    }
}

/// Upper bound on a single retry sleep.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Exponential backoff: `base * 2^(attempt - 1)`, capped at [`MAX_BACKOFF`].
/// Attempt 0 is the first try and never waits.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    base.saturating_mul(2u32.saturating_pow(attempt - 1))
        .min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn request_start_and_display() {
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 30)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let req = FetchRequest::new("SPY", Lookback::Years(5), Interval::Day1, as_of);
        assert_eq!(
            req.start().unwrap().date(),
            NaiveDate::from_ymd_opt(2019, 6, 30).unwrap()
        );
        assert_eq!(req.to_string(), "SPY 5y@1d");
        assert_eq!(req.adjustment, PriceAdjustment::Raw);
        assert_eq!(req.adjusted().adjustment, PriceAdjustment::Adjusted);
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let base = Duration::from_millis(250);
        assert_eq!(backoff_delay(base, 0), Duration::ZERO);
        assert_eq!(backoff_delay(base, 1), base);
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 20), MAX_BACKOFF);
        assert_eq!(backoff_delay(base, 40), MAX_BACKOFF);
        assert_eq!(backoff_delay(base, u32::MAX), MAX_BACKOFF);
    }

    #[test]
    fn transient_classification() {
        assert!(DataError::NetworkUnreachable("x".into()).is_transient());
        assert!(DataError::RateLimited { retry_after_secs: 1 }.is_transient());
        assert!(!DataError::CircuitBreakerTripped.is_transient());
        assert!(!DataError::Empty { symbol: "X".into() }.is_transient());
    }
}
