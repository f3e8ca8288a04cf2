//! Validation boundary: raw provider bars in, canonical `BarSeries` out.
//!
//! The engines only ever see series that passed through here.

use tracing::debug;

use super::provider::{BarProvider, DataError, FetchRequest, RawBar};
use crate::domain::{Bar, BarSeries, Interval};

/// Counts of bars removed while canonicalising a fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub received: usize,
    pub dropped_void: usize,
    pub dropped_invalid: usize,
    pub dropped_duplicate: usize,
}

impl IngestReport {
    pub fn dropped(&self) -> usize {
        self.dropped_void + self.dropped_invalid + self.dropped_duplicate
    }
}

#[derive(Debug, Clone)]
pub struct IngestResult {
    pub series: BarSeries,
    pub report: IngestReport,
}

/// Canonicalise raw bars: drop void and invalid bars, sort by timestamp, keep the
/// first bar of any duplicated timestamp.
pub fn ingest_series(
    symbol: &str,
    interval: Interval,
    raw: Vec<RawBar>,
) -> Result<IngestResult, DataError> {
    let mut report = IngestReport {
        received: raw.len(),
        ..Default::default()
    };

    let mut bars: Vec<Bar> = Vec::with_capacity(raw.len());
    for r in raw {
        let bar = Bar {
            timestamp: r.timestamp,
            open: r.open.filter(|o| o.is_finite()),
            high: r.high,
            low: r.low,
            close: r.close,
            volume: r.volume,
        };
        if bar.is_void() {
            report.dropped_void += 1;
            continue;
        }
        if bar.validate().is_err() {
            report.dropped_invalid += 1;
            continue;
        }
        bars.push(bar);
    }

    // Stable sort keeps provider order among equal timestamps, so dedup keeps the first.
    bars.sort_by_key(|b| b.timestamp);
    let before = bars.len();
    bars.dedup_by_key(|b| b.timestamp);
    report.dropped_duplicate = before - bars.len();

    if bars.is_empty() {
        return Err(DataError::Empty {
            symbol: symbol.to_string(),
        });
    }

    let series = BarSeries::new(symbol, interval, bars)
        .map_err(|e| DataError::ValidationError(e.to_string()))?;

    if report.dropped() > 0 {
        debug!(
            symbol,
            interval = %interval,
            received = report.received,
            dropped_void = report.dropped_void,
            dropped_invalid = report.dropped_invalid,
            dropped_duplicate = report.dropped_duplicate,
            "dropped bars during ingest"
        );
    }

    Ok(IngestResult { series, report })
}

/// Fetch one request from `provider` and run it through [`ingest_series`].
pub fn fetch_series(
    provider: &dyn BarProvider,
    request: &FetchRequest,
) -> Result<BarSeries, DataError> {
    if !provider.is_available() {
        return Err(DataError::CircuitBreakerTripped);
    }
    let raw = provider.fetch(request)?;
    ingest_series(&request.symbol, request.interval, raw).map(|r| r.series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn ts(day: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(day)
    }

    fn raw(day: i64, close: f64) -> RawBar {
        RawBar {
            timestamp: ts(day),
            open: Some(close),
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100.0,
        }
    }

    #[test]
    fn sorts_and_dedupes() {
        let bars = vec![raw(2, 12.0), raw(0, 10.0), raw(1, 11.0), raw(1, 99.0)];
        let result = ingest_series("X", Interval::Day1, bars).unwrap();
        assert_eq!(result.series.closes(), vec![10.0, 11.0, 12.0]);
        assert_eq!(result.report.dropped_duplicate, 1);
    }

    #[test]
    fn drops_void_and_invalid() {
        let mut void = raw(1, 11.0);
        void.close = f64::NAN;
        let mut inverted = raw(2, 12.0);
        inverted.high = 5.0;
        let mut negative = raw(3, 13.0);
        negative.volume = -10.0;
        let bars = vec![raw(0, 10.0), void, inverted, negative];

        let result = ingest_series("X", Interval::Day1, bars).unwrap();
        assert_eq!(result.series.len(), 1);
        assert_eq!(result.report.dropped_void, 1);
        assert_eq!(result.report.dropped_invalid, 2);
        assert_eq!(result.report.dropped(), 3);
    }

    #[test]
    fn nan_open_becomes_none() {
        let mut bar = raw(0, 10.0);
        bar.open = Some(f64::NAN);
        let result = ingest_series("X", Interval::Day1, vec![bar]).unwrap();
        assert_eq!(result.series.bars()[0].open, None);
    }

    #[test]
    fn nothing_left_is_empty() {
        let mut void = raw(0, 10.0);
        void.high = f64::NAN;
        let err = ingest_series("X", Interval::Day1, vec![void]).unwrap_err();
        assert_eq!(err, DataError::Empty { symbol: "X".into() });
        assert!(ingest_series("X", Interval::Day1, vec![]).is_err());
    }
}
