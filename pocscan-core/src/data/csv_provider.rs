//! Offline bar provider reading one CSV file per symbol and interval.
//!
//! Layout: `<dir>/<SYMBOL>_<interval>.csv`, e.g. `data/SPY_1d.csv`.
//! The header must be exactly `timestamp,open,high,low,close,volume`. Timestamps
//! are `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS` (a `T` separator is also accepted).
//! CSV prices are taken as-is; no adjustment is applied.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::debug;

use super::provider::{BarProvider, DataError, DataSource, FetchRequest, RawBar};
use crate::domain::Interval;

pub const CSV_HEADER: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CsvProvider {
    dir: PathBuf,
}

impl CsvProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, symbol: &str, interval: Interval) -> PathBuf {
        self.dir.join(format!("{symbol}_{}.csv", interval.code()))
    }

    /// Read every bar in a file without applying any window.
    pub fn read_file(path: &Path) -> Result<Vec<RawBar>, DataError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| DataError::Io(format!("{}: {e}", path.display())))?;

        let headers = reader
            .headers()
            .map_err(|e| DataError::SchemaMismatch(format!("{}: {e}", path.display())))?;
        if headers.iter().ne(CSV_HEADER.iter().copied()) {
            return Err(DataError::SchemaMismatch(format!(
                "{}: expected header '{}', found '{}'",
                path.display(),
                CSV_HEADER.join(","),
                headers.iter().collect::<Vec<_>>().join(",")
            )));
        }

        let mut bars = Vec::new();
        for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
            let row = row.map_err(|e| {
                DataError::SchemaMismatch(format!("{} row {}: {e}", path.display(), line + 2))
            })?;
            let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| {
                DataError::SchemaMismatch(format!(
                    "{} row {}: unparseable timestamp '{}'",
                    path.display(),
                    line + 2,
                    row.timestamp
                ))
            })?;
            bars.push(RawBar {
                timestamp,
                open: row.open,
                high: row.high.unwrap_or(f64::NAN),
                low: row.low.unwrap_or(f64::NAN),
                close: row.close.unwrap_or(f64::NAN),
                volume: row.volume.unwrap_or(0.0),
            });
        }
        Ok(bars)
    }
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl BarProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn source(&self) -> DataSource {
        DataSource::CsvImport
    }

    fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawBar>, DataError> {
        let path = self.path_for(&request.symbol, request.interval);
        if !path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: request.symbol.clone(),
            });
        }

        let start = request.start();
        let bars: Vec<RawBar> = Self::read_file(&path)?
            .into_iter()
            .filter(|b| b.timestamp <= request.as_of)
            .filter(|b| start.map_or(true, |s| b.timestamp >= s))
            .collect();

        debug!(request = %request, path = %path.display(), bars = bars.len(), "read CSV bars");
        Ok(bars)
    }
}
