//! Result sinks: CSV and JSON artifacts for screening and signal batches.
//!
//! Artifact names encode the screen and the ISO week of the batch date:
//! `POC_p5y_s5_week_26.csv`, or `POC_ST_p5y_s5_week_26.csv` when SuperTrend
//! columns are present. Signal scans write `key_reversal_signals_week_26` and
//! `rsi_divergences_week_26`. JSON artifacts carry a `schema_version`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use pocscan_core::domain::{Interval, Lookback};

use crate::record::ScreeningRecord;
use crate::screen::{BatchResult, FilteredInstrument, UnitError};
use crate::signals::{DivergenceRecord, KeyReversalRecord, SignalBatch};

/// Current schema version for JSON artifacts.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Anything that persists a finished batch.
pub trait ResultSink {
    /// Write the batch and return the artifact path.
    fn write(&self, batch: &BatchResult) -> Result<PathBuf, ExportError>;

    /// Write a rendered signal scan and return the artifact path.
    fn write_signals(&self, table: &SignalTable) -> Result<PathBuf, ExportError>;
}

/// `POC[_ST]_p{lookback}_s{threshold}_week_{iso_week}` (no extension).
pub fn artifact_name(
    lookback: Lookback,
    threshold_pct: f64,
    date: NaiveDate,
    with_trend: bool,
) -> String {
    let prefix = if with_trend { "POC_ST" } else { "POC" };
    format!(
        "{prefix}_p{lookback}_s{threshold_pct}_week_{}",
        date.iso_week().week()
    )
}

fn batch_artifact_name(batch: &BatchResult) -> String {
    artifact_name(
        batch.screen.lookback,
        batch.screen.threshold_pct,
        batch.as_of.date(),
        !batch.trend_intervals.is_empty(),
    )
}

fn trend_column(interval: Interval) -> String {
    format!("st_{}_pct", interval.code())
}

fn fmt4(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.4}")
    } else {
        String::new()
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(fmt4).unwrap_or_default()
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Render a batch as CSV: one row per record, one `st_<interval>_pct` column per
/// trend interval, empty cells where a value is missing.
pub fn records_csv(
    records: &[ScreeningRecord],
    trend_intervals: &[Interval],
) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header: Vec<String> = [
        "symbol",
        "groups",
        "poc",
        "current_price",
        "distance_pct",
        "all_time_high",
        "max_drawdown_pct",
        "avg_drawdown_pct",
        "current_drawdown_pct",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(trend_intervals.iter().map(|i| trend_column(*i)));
    wtr.write_record(&header)?;

    for r in records {
        let mut row = vec![
            r.symbol.clone(),
            r.groups.clone(),
            fmt4(r.poc),
            fmt4(r.current_price),
            fmt4(r.distance_pct),
            fmt4(r.all_time_high),
            fmt4(r.max_drawdown_pct),
            fmt4(r.avg_drawdown_pct),
            fmt4(r.current_drawdown_pct),
        ];
        row.extend(
            trend_intervals
                .iter()
                .map(|i| fmt_opt(r.trend(*i).and_then(|t| t.delta_pct))),
        );
        wtr.write_record(&row)?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| ExportError::Csv(e.into_error().into()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ResultSink for CsvSink {
    fn write(&self, batch: &BatchResult) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;
        let path = self.dir.join(format!("{}.csv", batch_artifact_name(batch)));
        let body = records_csv(&batch.records, &batch.trend_intervals)?;
        fs::write(&path, body).map_err(io_error(&path))?;
        info!(path = %path.display(), records = batch.records.len(), "wrote CSV artifact");
        Ok(path)
    }

    fn write_signals(&self, table: &SignalTable) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;
        let path = self.dir.join(format!("{}.csv", table.name));
        fs::write(&path, table.to_csv()?).map_err(io_error(&path))?;
        info!(path = %path.display(), records = table.len(), "wrote CSV artifact");
        Ok(path)
    }
}

// ─── JSON ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct FailureRow<'a> {
    symbol: &'a str,
    stage: String,
    kind: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct JsonArtifact<'a> {
    schema_version: u32,
    lookback: String,
    threshold_pct: f64,
    as_of: String,
    trend_intervals: Vec<&'static str>,
    records: &'a [ScreeningRecord],
    filtered: &'a [FilteredInstrument],
    failures: Vec<FailureRow<'a>>,
}

/// Pretty JSON document for a batch, including filtered and failed instruments.
pub fn batch_json(batch: &BatchResult) -> Result<String, ExportError> {
    let doc = JsonArtifact {
        schema_version: SCHEMA_VERSION,
        lookback: batch.screen.lookback.to_string(),
        threshold_pct: batch.screen.threshold_pct,
        as_of: batch.as_of.to_string(),
        trend_intervals: batch.trend_intervals.iter().map(|i| i.code()).collect(),
        records: &batch.records,
        filtered: &batch.filtered,
        failures: failure_rows(&batch.failures),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

fn failure_rows(failures: &[UnitError]) -> Vec<FailureRow<'_>> {
    failures
        .iter()
        .map(|f| FailureRow {
            symbol: &f.symbol,
            stage: f.stage.to_string(),
            kind: f.source.kind(),
            message: f.source.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct JsonSink {
    dir: PathBuf,
}

impl JsonSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ResultSink for JsonSink {
    fn write(&self, batch: &BatchResult) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;
        let path = self.dir.join(format!("{}.json", batch_artifact_name(batch)));
        fs::write(&path, batch_json(batch)?).map_err(io_error(&path))?;
        info!(path = %path.display(), records = batch.records.len(), "wrote JSON artifact");
        Ok(path)
    }

    fn write_signals(&self, table: &SignalTable) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;
        let path = self.dir.join(format!("{}.json", table.name));
        fs::write(&path, table.to_json()?).map_err(io_error(&path))?;
        info!(path = %path.display(), records = table.len(), "wrote JSON artifact");
        Ok(path)
    }
}

// ─── Signals ────────────────────────────────────────────────────────

/// `{prefix}_week_{iso_week}` (no extension).
pub fn signal_artifact_name(prefix: &str, date: NaiveDate) -> String {
    format!("{prefix}_week_{}", date.iso_week().week())
}

/// A signal row type with a fixed artifact prefix and CSV layout.
pub trait SignalRecord: Serialize {
    const ARTIFACT: &'static str;
    const HEADER: &'static [&'static str];

    fn csv_row(&self) -> Vec<String>;
}

impl SignalRecord for KeyReversalRecord {
    const ARTIFACT: &'static str = "key_reversal_signals";
    const HEADER: &'static [&'static str] = &["symbol", "groups", "date", "signal", "close", "rsi"];

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.symbol.clone(),
            self.groups.clone(),
            self.date.to_string(),
            self.bias.to_string(),
            fmt4(self.close),
            fmt4(self.rsi),
        ]
    }
}

impl SignalRecord for DivergenceRecord {
    const ARTIFACT: &'static str = "rsi_divergences";
    const HEADER: &'static [&'static str] = &[
        "symbol", "groups", "mode", "date1", "price1", "rsi1", "date2", "price2", "rsi2",
    ];

    fn csv_row(&self) -> Vec<String> {
        vec![
            self.symbol.clone(),
            self.groups.clone(),
            self.bias.to_string(),
            self.date1.to_string(),
            fmt4(self.price1),
            fmt4(self.rsi1),
            self.date2.to_string(),
            fmt4(self.price2),
            fmt4(self.rsi2),
        ]
    }
}

#[derive(Debug, Serialize)]
struct SignalArtifact<'a, T: Serialize> {
    schema_version: u32,
    scan: &'static str,
    as_of: String,
    records: &'a [T],
    failures: Vec<FailureRow<'a>>,
}

/// A signal batch rendered for any sink.
#[derive(Debug, Clone)]
pub struct SignalTable {
    /// Artifact name without extension.
    pub name: String,
    pub header: &'static [&'static str],
    pub rows: Vec<Vec<String>>,
    document: serde_json::Value,
}

impl SignalTable {
    pub fn from_batch<T: SignalRecord>(batch: &SignalBatch<T>) -> Result<Self, ExportError> {
        let doc = SignalArtifact {
            schema_version: SCHEMA_VERSION,
            scan: T::ARTIFACT,
            as_of: batch.as_of.to_string(),
            records: &batch.records,
            failures: failure_rows(&batch.failures),
        };
        Ok(Self {
            name: signal_artifact_name(T::ARTIFACT, batch.as_of.date()),
            header: T::HEADER,
            rows: batch.records.iter().map(T::csv_row).collect(),
            document: serde_json::to_value(&doc)?,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_csv(&self) -> Result<String, ExportError> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.write_record(self.header)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| ExportError::Csv(e.into_error().into()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(&self.document)?)
    }
}
