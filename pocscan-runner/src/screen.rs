//! Multi-timeframe screener.
//!
//! Per instrument and screen: POC over the screen lookback, current price and
//! distance filter, SuperTrend per trend interval, drawdown since
//! `drawdown_since`, then one merged `ScreeningRecord`. Every failure is caught
//! at the instrument (or instrument x timeframe) boundary and reported as an
//! outcome; nothing escapes into the batch.
//!
//! Instruments run on a private rayon pool sized by `ScreenConfig::worker_count`.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use pocscan_core::data::{backoff_delay, fetch_series, BarProvider, DataError, FetchRequest};
use pocscan_core::domain::{BarSeries, Instrument, Interval, Lookback};
use pocscan_core::indicators::{
    compute_drawdown, compute_poc, compute_supertrend, distance_pct, within_threshold,
    DrawdownSummary,
};
use pocscan_core::ScreenError;

use crate::config::{ConfigError, ScreenConfig, ScreenSpec};
use crate::record::{ScreeningRecord, TrendReading};

/// Window used to read the current price.
const PRICE_LOOKBACK: Lookback = Lookback::Days(5);
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Pipeline step an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Poc,
    Price,
    Trend(Interval),
    Drawdown,
    KeyReversal,
    Divergence,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Poc => f.write_str("poc"),
            Stage::Price => f.write_str("price"),
            Stage::Trend(interval) => write!(f, "trend_{interval}"),
            Stage::Drawdown => f.write_str("drawdown"),
            Stage::KeyReversal => f.write_str("key_reversal"),
            Stage::Divergence => f.write_str("divergence"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{symbol} [{stage}]: {source}")]
pub struct UnitError {
    pub symbol: String,
    pub stage: Stage,
    #[source]
    pub source: ScreenError,
}

impl UnitError {
    pub(crate) fn new(symbol: &str, stage: Stage, source: ScreenError) -> Self {
        Self {
            symbol: symbol.to_string(),
            stage,
            source,
        }
    }
}

/// Instrument that produced a POC and price but fell outside the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredInstrument {
    pub symbol: String,
    pub poc: f64,
    pub current_price: f64,
    pub distance_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentOutcome {
    Qualified(ScreeningRecord),
    Filtered(FilteredInstrument),
    Failed(UnitError),
}

/// Everything one screen produced over one instrument list.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub screen: ScreenSpec,
    pub as_of: NaiveDateTime,
    pub trend_intervals: Vec<Interval>,
    /// Sorted by current drawdown, deepest first, ties by symbol.
    pub records: Vec<ScreeningRecord>,
    pub filtered: Vec<FilteredInstrument>,
    pub failures: Vec<UnitError>,
}

impl BatchResult {
    pub fn processed(&self) -> usize {
        self.records.len() + self.filtered.len()
    }
}

/// Per-screen result of [`Screener::inspect`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenCheck {
    pub screen: ScreenSpec,
    pub poc: Result<f64, ScreenError>,
    pub distance_pct: Option<f64>,
    pub passed: bool,
}

/// Unfiltered diagnostics for one instrument across every configured screen.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectReport {
    pub instrument: Instrument,
    pub current_price: Result<f64, ScreenError>,
    pub screens: Vec<ScreenCheck>,
    pub trends: Vec<TrendReading>,
    pub drawdown: Result<DrawdownSummary, ScreenError>,
}

pub struct Screener {
    provider: Arc<dyn BarProvider>,
    config: ScreenConfig,
    as_of: NaiveDateTime,
    pool: rayon::ThreadPool,
}

impl Screener {
    pub fn new(
        provider: Arc<dyn BarProvider>,
        config: ScreenConfig,
        as_of: NaiveDateTime,
    ) -> Result<Self, RunError> {
        config.validate()?;
        // Private pool: batch workers never compete with the global rayon pool.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_count())
            .thread_name(|i| format!("pocscan-worker-{i}"))
            .build()
            .map_err(|e| RunError::ThreadPool(e.to_string()))?;
        Ok(Self {
            provider,
            config,
            as_of,
            pool,
        })
    }

    pub fn config(&self) -> &ScreenConfig {
        &self.config
    }

    pub fn as_of(&self) -> NaiveDateTime {
        self.as_of
    }

    pub(crate) fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Run `op` on the batch pool.
    pub(crate) fn install<R, OP>(&self, op: OP) -> R
    where
        R: Send,
        OP: FnOnce() -> R + Send,
    {
        self.pool.install(op)
    }

    /// Run every configured screen, one batch each.
    pub fn run_all(&self, instruments: &[Instrument]) -> Vec<BatchResult> {
        self.config
            .screens
            .iter()
            .map(|screen| self.run_batch(instruments, *screen))
            .collect()
    }

    pub fn run_batch(&self, instruments: &[Instrument], screen: ScreenSpec) -> BatchResult {
        let started = Instant::now();
        info!(
            screen = %screen,
            instruments = instruments.len(),
            provider = self.provider.name(),
            "batch started"
        );

        let outcomes: Vec<InstrumentOutcome> = self.pool.install(|| {
            instruments
                .par_iter()
                .map(|instrument| self.screen_instrument(instrument, screen))
                .collect()
        });

        let mut records = Vec::new();
        let mut filtered = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                InstrumentOutcome::Qualified(record) => records.push(record),
                InstrumentOutcome::Filtered(f) => filtered.push(f),
                InstrumentOutcome::Failed(e) => failures.push(e),
            }
        }
        sort_records(&mut records);

        info!(
            screen = %screen,
            qualified = records.len(),
            filtered = filtered.len(),
            failed = failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch finished"
        );

        BatchResult {
            screen,
            as_of: self.as_of,
            trend_intervals: self.config.trend_intervals.clone(),
            records,
            filtered,
            failures,
        }
    }

    /// Run the full pipeline for one instrument under one screen.
    pub fn screen_instrument(
        &self,
        instrument: &Instrument,
        screen: ScreenSpec,
    ) -> InstrumentOutcome {
        match self.pipeline(instrument, screen) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    symbol = %err.symbol,
                    stage = %err.stage,
                    kind = err.source.kind(),
                    error = %err.source,
                    "instrument failed"
                );
                InstrumentOutcome::Failed(err)
            }
        }
    }

    fn pipeline(
        &self,
        instrument: &Instrument,
        screen: ScreenSpec,
    ) -> Result<InstrumentOutcome, UnitError> {
        let symbol = instrument.symbol.as_str();

        let poc = self
            .poc(symbol, screen.lookback)
            .map_err(|e| UnitError::new(symbol, Stage::Poc, e))?;

        let current_price = self
            .current_price(symbol)
            .map_err(|e| UnitError::new(symbol, Stage::Price, e))?;

        let distance = distance_pct(current_price, poc);
        if !within_threshold(distance, screen.threshold_pct) {
            debug!(symbol, poc, current_price, distance_pct = distance, "outside threshold");
            return Ok(InstrumentOutcome::Filtered(FilteredInstrument {
                symbol: symbol.to_string(),
                poc,
                current_price,
                distance_pct: distance,
            }));
        }

        let trends = self.trends(symbol, current_price);

        let drawdown = self
            .drawdown(symbol)
            .map_err(|e| UnitError::new(symbol, Stage::Drawdown, e))?;

        info!(symbol, poc, current_price, distance_pct = distance, "qualified");
        Ok(InstrumentOutcome::Qualified(ScreeningRecord::new(
            symbol,
            instrument.membership(),
            poc,
            current_price,
            distance,
            drawdown,
            trends,
        )))
    }

    /// Diagnostics for one instrument: every screen, no filtering.
    pub fn inspect(&self, instrument: &Instrument) -> InspectReport {
        let symbol = instrument.symbol.as_str();
        let current_price = self.current_price(symbol);

        let screens = self
            .config
            .screens
            .iter()
            .map(|screen| {
                let poc = self.poc(symbol, screen.lookback);
                let distance_pct = match (&poc, &current_price) {
                    (Ok(poc), Ok(price)) => Some(distance_pct(*price, *poc)),
                    _ => None,
                };
                ScreenCheck {
                    screen: *screen,
                    passed: distance_pct
                        .is_some_and(|d| within_threshold(d, screen.threshold_pct)),
                    poc,
                    distance_pct,
                }
            })
            .collect();

        let trends = match &current_price {
            Ok(price) => self.trends(symbol, *price),
            Err(_) => self
                .config
                .trend_intervals
                .iter()
                .map(|i| TrendReading::empty(*i))
                .collect(),
        };

        InspectReport {
            instrument: instrument.clone(),
            current_price,
            screens,
            trends,
            drawdown: self.drawdown(symbol),
        }
    }

    fn poc(&self, symbol: &str, lookback: Lookback) -> Result<f64, ScreenError> {
        let request = FetchRequest::new(symbol, lookback, Interval::Day1, self.as_of);
        let series = self.fetch(&request)?;
        compute_poc(series.bars(), self.config.engine.bin_count)
    }

    fn current_price(&self, symbol: &str) -> Result<f64, ScreenError> {
        let request = FetchRequest::new(symbol, PRICE_LOOKBACK, Interval::Day1, self.as_of);
        Ok(self.fetch(&request)?.last_close())
    }

    /// One reading per configured interval; failures leave the slot empty.
    fn trends(&self, symbol: &str, price: f64) -> Vec<TrendReading> {
        let params = self.config.engine.supertrend();
        self.config
            .trend_intervals
            .iter()
            .map(|&interval| {
                let request = FetchRequest::new(
                    symbol,
                    interval.default_trend_lookback(),
                    interval,
                    self.as_of,
                )
                .adjusted();
                let reading = self
                    .fetch(&request)
                    .and_then(|series| compute_supertrend(series.bars(), &params));
                match reading {
                    Ok(series) => TrendReading::from_state(interval, series.last(), price),
                    Err(e) => {
                        let stage = Stage::Trend(interval);
                        warn!(
                            symbol,
                            stage = %stage,
                            kind = e.kind(),
                            error = %e,
                            "trend unavailable"
                        );
                        TrendReading::empty(interval)
                    }
                }
            })
            .collect()
    }

    fn drawdown(&self, symbol: &str) -> Result<DrawdownSummary, ScreenError> {
        let request =
            FetchRequest::new(symbol, Lookback::Max, Interval::Day1, self.as_of).adjusted();
        let series = self.fetch(&request)?;
        let since = self
            .config
            .drawdown_since
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default();
        let window = series.since(since).ok_or(ScreenError::InsufficientHistory {
            required: 1,
            available: 0,
        })?;
        compute_drawdown(&window.closes())
    }

    /// Fetch through the ingest boundary, retrying transient provider errors.
    pub(crate) fn fetch(&self, request: &FetchRequest) -> Result<BarSeries, ScreenError> {
        let mut attempt = 0;
        loop {
            match fetch_series(self.provider.as_ref(), request) {
                Ok(series) => return Ok(series),
                Err(e) if attempt < self.config.retries && e.is_transient() => {
                    attempt += 1;
                    debug!(request = %request, attempt, error = %e, "retrying fetch");
                    std::thread::sleep(backoff_delay(RETRY_BASE_DELAY, attempt));
                }
                Err(e) => return Err(ScreenError::from(annotate(e, request))),
            }
        }
    }
}

fn annotate(e: DataError, request: &FetchRequest) -> DataError {
    match e {
        DataError::Other(msg) => DataError::Other(format!("{request}: {msg}")),
        other => other,
    }
}

/// Deepest current drawdown first; ties broken by symbol.
pub fn sort_records(records: &mut [ScreeningRecord]) {
    records.sort_by(|a, b| {
        b.current_drawdown_pct
            .total_cmp(&a.current_drawdown_pct)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}
