//! Deterministic synthetic bar provider for tests, benches, and offline demos.
//!
//! Each (symbol, interval) pair gets its own BLAKE3-seeded random walk. The walk is
//! generated backwards from `as_of`, so the most recent bars are identical for any
//! lookback: a 5-day and a 5-year request agree on the last close.

use std::collections::HashSet;

use chrono::{Datelike, Duration, Months, NaiveDateTime, Timelike, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::provider::{BarProvider, DataError, DataSource, FetchRequest, RawBar};
use crate::domain::{Interval, Lookback};

/// History generated for `max` requests.
const MAX_HISTORY: Lookback = Lookback::Years(30);
/// Hard cap on bars per request (long hourly windows).
const MAX_BARS: usize = 20_000;

#[derive(Debug, Clone, Default)]
pub struct SyntheticProvider {
    empty_symbols: HashSet<String>,
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Symbols that always come back with zero bars.
    pub fn with_empty_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.empty_symbols.extend(symbols.into_iter().map(Into::into));
        self
    }

    pub fn generate(
        symbol: &str,
        interval: Interval,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Vec<RawBar> {
        // Deterministic seed from symbol and interval
        let key = format!("{symbol}:{}", interval.code());
        let seed: [u8; 32] = *blake3::hash(key.as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);

        let scale = volatility_scale(interval);
        let mut price: f64 = rng.gen_range(20.0..500.0);
        let mut bars = Vec::new();
        let mut current = align_end(end, interval);

        while current >= start && bars.len() < MAX_BARS {
            if skips(current, interval) {
                match step_back(current, interval) {
                    Some(prev) => current = prev,
                    None => break,
                }
                continue;
            }

            let ret: f64 = rng.gen_range(-0.03..0.03) * scale;
            let close = price;
            let open = close / (1.0 + ret);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01) * scale);
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01) * scale);
            let volume = rng.gen_range(500_000.0..5_000_000.0_f64).round();

            bars.push(RawBar {
                timestamp: current,
                open: Some(open),
                high,
                low,
                close,
                volume,
            });

            price = open;
            match step_back(current, interval) {
                Some(prev) => current = prev,
                None => break,
            }
        }

        bars.reverse();
        bars
    }
}

fn volatility_scale(interval: Interval) -> f64 {
    match interval {
        Interval::Hour1 => 0.25,
        Interval::Hour4 => 0.5,
        Interval::Day1 => 1.0,
        Interval::Week1 => 2.2,
        Interval::Month1 => 4.5,
    }
}

fn align_end(end: NaiveDateTime, interval: Interval) -> NaiveDateTime {
    let day = end.date();
    let midnight = day.and_hms_opt(0, 0, 0).unwrap_or(end);
    match interval {
        Interval::Hour1 => midnight + Duration::hours(i64::from(end.hour())),
        Interval::Hour4 => midnight + Duration::hours(i64::from(end.hour() / 4 * 4)),
        Interval::Day1 | Interval::Week1 => midnight,
        Interval::Month1 => day
            .with_day(1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or(midnight),
    }
}

fn skips(ts: NaiveDateTime, interval: Interval) -> bool {
    matches!(interval, Interval::Hour1 | Interval::Hour4 | Interval::Day1)
        && matches!(ts.weekday(), Weekday::Sat | Weekday::Sun)
}

fn step_back(ts: NaiveDateTime, interval: Interval) -> Option<NaiveDateTime> {
    match interval {
        Interval::Hour1 => ts.checked_sub_signed(Duration::hours(1)),
        Interval::Hour4 => ts.checked_sub_signed(Duration::hours(4)),
        Interval::Day1 => ts.checked_sub_signed(Duration::days(1)),
        Interval::Week1 => ts.checked_sub_signed(Duration::weeks(1)),
        Interval::Month1 => ts.checked_sub_months(Months::new(1)),
    }
}

impl BarProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn source(&self) -> DataSource {
        DataSource::Synthetic
    }

    fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawBar>, DataError> {
        if self.empty_symbols.contains(&request.symbol) {
            return Ok(Vec::new());
        }
        let start = request
            .start()
            .or_else(|| MAX_HISTORY.start_from(request.as_of))
            .ok_or_else(|| DataError::Other(format!("cannot resolve window for {request}")))?;
        Ok(Self::generate(
            &request.symbol,
            request.interval,
            start,
            request.as_of,
        ))
    }
}
