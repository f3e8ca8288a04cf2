//! Pocscan Runner: multi-timeframe screening, batch results, result sinks.
//!
//! This crate builds on `pocscan-core` to provide:
//! - `ScreenConfig` loaded from TOML (screens, trend intervals, engine params)
//! - The `Screener`: per-instrument pipeline on a private worker pool
//! - Per-unit outcomes aggregated into a `BatchResult` per screen
//! - Weekly key reversal and RSI divergence scans (`SignalBatch`)
//! - CSV and JSON result sinks with week-stamped artifact names

pub mod config;
pub mod export;
pub mod record;
pub mod screen;
pub mod signals;

pub use config::{ConfigError, ScreenConfig, ScreenSpec, SignalConfig};
pub use export::{
    artifact_name, signal_artifact_name, CsvSink, ExportError, JsonSink, ResultSink, SignalRecord,
    SignalTable, SCHEMA_VERSION,
};
pub use record::{ScreeningRecord, TrendReading};
pub use screen::{
    BatchResult, FilteredInstrument, InspectReport, InstrumentOutcome, RunError, ScreenCheck,
    Screener, Stage, UnitError,
};
pub use signals::{DivergenceRecord, KeyReversalRecord, SignalBatch};
