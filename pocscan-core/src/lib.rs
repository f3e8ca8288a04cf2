//! Pocscan Core: screening engines, domain types, and the bar data layer.
//!
//! - Domain types (bars, validated series, intervals, lookbacks, instruments)
//! - Volume profile with point of control
//! - Wilder ATR and the SuperTrend ratchet state machine
//! - Running-peak drawdown statistics
//! - Bar providers (Yahoo Finance, CSV directory, synthetic) behind one trait
//! - Universe loading from TOML

pub mod data;
pub mod domain;
pub mod error;
pub mod indicators;
pub mod params;

pub use error::ScreenError;
pub use params::EngineParams;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared across batch worker threads is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::BarSeries>();
        require_sync::<domain::BarSeries>();
        require_send::<domain::Instrument>();
        require_sync::<domain::Instrument>();

        // Engine outputs
        require_send::<indicators::VolumeProfile>();
        require_sync::<indicators::VolumeProfile>();
        require_send::<indicators::SupertrendSeries>();
        require_sync::<indicators::SupertrendSeries>();
        require_send::<indicators::DrawdownSummary>();
        require_sync::<indicators::DrawdownSummary>();
        require_send::<indicators::KeyReversal>();
        require_sync::<indicators::KeyReversal>();
        require_send::<indicators::Divergence>();
        require_sync::<indicators::Divergence>();
        require_send::<EngineParams>();
        require_sync::<EngineParams>();
        require_send::<ScreenError>();
        require_sync::<ScreenError>();

        // Providers
        require_send::<data::YahooProvider>();
        require_sync::<data::YahooProvider>();
        require_send::<data::CsvProvider>();
        require_sync::<data::CsvProvider>();
        require_send::<data::SyntheticProvider>();
        require_sync::<data::SyntheticProvider>();
        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();
    }

    /// Indicators only ever receive the bar slice they are asked about, so a value
    /// at index t cannot depend on anything the caller did not hand over.
    #[test]
    fn indicator_trait_takes_only_bars() {
        fn _check_trait_object_builds(
            ind: &dyn indicators::Indicator,
            bars: &[domain::Bar],
        ) -> Vec<f64> {
            ind.compute(bars)
        }
    }

    /// Providers are usable as trait objects shared between threads.
    #[test]
    fn provider_trait_object_is_shareable() {
        fn _check(p: std::sync::Arc<dyn data::BarProvider>) -> impl Send + Sync {
            p
        }
    }
}
