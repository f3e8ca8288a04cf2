//! Weekly RSI signal scans.
//!
//! Two scans share the screener's provider and worker pool:
//! - key reversals over `key_reversal_history` of weekly bars, keeping those
//!   stamped within `key_reversal_recent_days` of the as-of date
//! - RSI divergences over `divergence_history` of weekly bars
//!
//! Both use raw (unadjusted) prices. Records keep the instrument order of the
//! input list and are oldest first within an instrument.

use std::time::Instant;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use pocscan_core::data::FetchRequest;
use pocscan_core::domain::{BarSeries, Instrument, Interval, Lookback};
use pocscan_core::indicators::{key_reversals, rsi_divergences, Bias, Divergence, KeyReversal};
use pocscan_core::ScreenError;

use crate::screen::{Screener, Stage, UnitError};

/// Weekly bars are stamped on the first session; reports use the week's Friday.
pub const REPORT_DAY_OFFSET: i64 = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyReversalRecord {
    pub symbol: String,
    pub groups: String,
    /// Bar date plus [`REPORT_DAY_OFFSET`].
    pub date: NaiveDate,
    pub bias: Bias,
    pub close: f64,
    pub rsi: f64,
}

impl KeyReversalRecord {
    pub fn new(instrument: &Instrument, signal: &KeyReversal) -> Self {
        Self {
            symbol: instrument.symbol.clone(),
            groups: instrument.membership(),
            date: (signal.timestamp + Duration::days(REPORT_DAY_OFFSET)).date(),
            bias: signal.bias,
            close: signal.close,
            rsi: signal.rsi,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DivergenceRecord {
    pub symbol: String,
    pub groups: String,
    pub bias: Bias,
    pub date1: NaiveDate,
    pub price1: f64,
    pub rsi1: f64,
    pub date2: NaiveDate,
    pub price2: f64,
    pub rsi2: f64,
}

impl DivergenceRecord {
    pub fn new(instrument: &Instrument, div: &Divergence) -> Self {
        Self {
            symbol: instrument.symbol.clone(),
            groups: instrument.membership(),
            bias: div.bias,
            date1: div.first.timestamp.date(),
            price1: div.first.price,
            rsi1: div.first.rsi,
            date2: div.second.timestamp.date(),
            price2: div.second.price,
            rsi2: div.second.rsi,
        }
    }
}

/// Everything one signal scan produced over one instrument list.
#[derive(Debug, Clone)]
pub struct SignalBatch<T> {
    pub as_of: NaiveDateTime,
    pub records: Vec<T>,
    pub failures: Vec<UnitError>,
}

impl<T> SignalBatch<T> {
    pub fn count(&self, bias: Bias) -> usize
    where
        T: HasBias,
    {
        self.records.iter().filter(|r| r.bias() == bias).count()
    }
}

pub trait HasBias {
    fn bias(&self) -> Bias;
}

impl HasBias for KeyReversalRecord {
    fn bias(&self) -> Bias {
        self.bias
    }
}

impl HasBias for DivergenceRecord {
    fn bias(&self) -> Bias {
        self.bias
    }
}

impl Screener {
    pub fn scan_key_reversals(
        &self,
        instruments: &[Instrument],
    ) -> SignalBatch<KeyReversalRecord> {
        self.scan("key_reversal", instruments, |i| self.key_reversals_for(i))
    }

    pub fn scan_divergences(&self, instruments: &[Instrument]) -> SignalBatch<DivergenceRecord> {
        self.scan("divergence", instruments, |i| self.divergences_for(i))
    }

    /// Recent key reversals for one instrument.
    pub fn key_reversals_for(
        &self,
        instrument: &Instrument,
    ) -> Result<Vec<KeyReversalRecord>, UnitError> {
        let symbol = instrument.symbol.as_str();
        let signals = &self.config().signals;
        let err = |e: ScreenError| UnitError::new(symbol, Stage::KeyReversal, e);

        let series = self.weekly(symbol, signals.key_reversal_history).map_err(err)?;
        let cutoff = self.as_of() - Duration::days(signals.key_reversal_recent_days);
        let found = key_reversals(series.bars(), &signals.key_reversal).map_err(err)?;
        let total = found.len();

        let recent: Vec<KeyReversalRecord> = found
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .map(|s| KeyReversalRecord::new(instrument, s))
            .collect();
        debug!(symbol, total, recent = recent.len(), "key reversals");
        Ok(recent)
    }

    /// Bullish then bearish divergence for one instrument, each at most once.
    pub fn divergences_for(
        &self,
        instrument: &Instrument,
    ) -> Result<Vec<DivergenceRecord>, UnitError> {
        let symbol = instrument.symbol.as_str();
        let signals = &self.config().signals;
        let err = |e: ScreenError| UnitError::new(symbol, Stage::Divergence, e);

        let series = self.weekly(symbol, signals.divergence_history).map_err(err)?;
        let found =
            rsi_divergences(series.bars(), &signals.divergence, self.as_of()).map_err(err)?;
        for div in &found {
            info!(symbol, bias = %div.bias, "divergence");
        }
        Ok(found
            .iter()
            .map(|d| DivergenceRecord::new(instrument, d))
            .collect())
    }

    fn weekly(&self, symbol: &str, lookback: Lookback) -> Result<BarSeries, ScreenError> {
        let request = FetchRequest::new(symbol, lookback, Interval::Week1, self.as_of());
        self.fetch(&request)
    }

    fn scan<T, F>(
        &self,
        name: &'static str,
        instruments: &[Instrument],
        scan_one: F,
    ) -> SignalBatch<T>
    where
        T: Send,
        F: Fn(&Instrument) -> Result<Vec<T>, UnitError> + Sync,
    {
        let started = Instant::now();
        info!(
            scan = name,
            instruments = instruments.len(),
            provider = self.provider_name(),
            "signal scan started"
        );

        let outcomes: Vec<Result<Vec<T>, UnitError>> = self.install(|| {
            instruments
                .par_iter()
                .map(|instrument| scan_one(instrument))
                .collect()
        });

        let mut records = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(mut found) => records.append(&mut found),
                Err(e) => {
                    warn!(
                        symbol = %e.symbol,
                        stage = %e.stage,
                        kind = e.source.kind(),
                        error = %e.source,
                        "instrument failed"
                    );
                    failures.push(e);
                }
            }
        }

        info!(
            scan = name,
            signals = records.len(),
            failed = failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "signal scan finished"
        );

        SignalBatch {
            as_of: self.as_of(),
            records,
            failures,
        }
    }
}
