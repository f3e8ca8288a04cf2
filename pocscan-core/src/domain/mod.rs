//! Domain types for pocscan

pub mod bar;
pub mod instrument;
pub mod interval;
pub mod series;

pub use bar::{Bar, BarError};
pub use instrument::Instrument;
pub use interval::{Interval, Lookback, ParseError};
pub use series::{BarSeries, SeriesError};
