//! Bar data layer: providers, the ingest boundary, and universe loading.

pub mod circuit_breaker;
pub mod csv_provider;
pub mod ingest;
pub mod provider;
pub mod synthetic;
pub mod universe;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use csv_provider::CsvProvider;
pub use ingest::{fetch_series, ingest_series, IngestReport, IngestResult};
pub use provider::{
    backoff_delay, BarProvider, DataError, DataSource, FetchRequest, PriceAdjustment, RawBar,
    MAX_BACKOFF,
};
pub use synthetic::SyntheticProvider;
pub use universe::{Universe, UniverseError};
pub use yahoo::YahooProvider;
