//! Serializable screening configuration.
//!
//! One `ScreenConfig` drives a whole run: the list of (lookback, threshold)
//! screens, the SuperTrend timeframes, the drawdown window, worker count, the
//! engine parameters, and the weekly RSI signal scans. It is passed explicitly
//! to the screener; nothing in the workspace reads global state.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pocscan_core::domain::{Interval, Lookback};
use pocscan_core::indicators::{DivergenceParams, KeyReversalParams};
use pocscan_core::EngineParams;

/// Upper bound on `retries`; each retry may sleep up to `MAX_BACKOFF`.
pub const MAX_RETRIES: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid screen '{0}': expected <lookback>:<threshold_pct>, e.g. 5y:5")]
    InvalidScreen(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One screening pass: POC over `lookback`, keep instruments within `threshold_pct`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenSpec {
    pub lookback: Lookback,
    pub threshold_pct: f64,
}

impl ScreenSpec {
    pub fn new(lookback: Lookback, threshold_pct: f64) -> Self {
        Self {
            lookback,
            threshold_pct,
        }
    }
}

impl fmt::Display for ScreenSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.lookback, self.threshold_pct)
    }
}

/// Parses the CLI form `<lookback>:<threshold>`, e.g. `20y:15` or `6mo:2.5`.
impl FromStr for ScreenSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidScreen(s.to_string());
        let (lookback, threshold) = s.split_once(':').ok_or_else(invalid)?;
        let lookback: Lookback = lookback.trim().parse().map_err(|_| invalid())?;
        let threshold_pct: f64 = threshold.trim().parse().map_err(|_| invalid())?;
        Ok(Self::new(lookback, threshold_pct))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub screens: Vec<ScreenSpec>,
    pub trend_intervals: Vec<Interval>,
    /// First date of the close history used for drawdown statistics.
    pub drawdown_since: NaiveDate,
    /// Worker threads for a batch; `None` uses the available parallelism.
    pub workers: Option<usize>,
    /// Extra attempts per provider request on transient errors.
    pub retries: u32,
    pub engine: EngineParams,
    pub signals: SignalConfig,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            screens: vec![
                ScreenSpec::new(Lookback::Years(20), 15.0),
                ScreenSpec::new(Lookback::Years(5), 5.0),
            ],
            trend_intervals: vec![
                Interval::Hour4,
                Interval::Day1,
                Interval::Week1,
                Interval::Month1,
            ],
            drawdown_since: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default(),
            workers: None,
            retries: 0,
            engine: EngineParams::default(),
            signals: SignalConfig::default(),
        }
    }
}

impl ScreenConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ScreenConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.screens.is_empty() {
            return Err(ConfigError::Invalid("at least one screen is required".into()));
        }
        for screen in &self.screens {
            if !screen.threshold_pct.is_finite() || screen.threshold_pct < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "screen {screen}: threshold must be a non-negative number"
                )));
            }
        }
        if self.retries > MAX_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "retries must be <= {MAX_RETRIES}, got {}",
                self.retries
            )));
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be >= 1".into()));
        }
        let mut seen = Vec::with_capacity(self.trend_intervals.len());
        for interval in &self.trend_intervals {
            if seen.contains(interval) {
                return Err(ConfigError::Invalid(format!(
                    "trend interval {interval} listed twice"
                )));
            }
            seen.push(*interval);
        }
        self.engine
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.signals.validate()
    }

    /// Worker count after resolving the default.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// Weekly key reversal and RSI divergence scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub key_reversal: KeyReversalParams,
    /// Weekly history fetched for the key reversal scan.
    pub key_reversal_history: Lookback,
    /// Only reversals reported within this many days of the as-of date are kept.
    pub key_reversal_recent_days: i64,
    pub divergence: DivergenceParams,
    pub divergence_history: Lookback,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            key_reversal: KeyReversalParams::default(),
            key_reversal_history: Lookback::Years(2),
            key_reversal_recent_days: 30,
            divergence: DivergenceParams::default(),
            divergence_history: Lookback::Years(1),
        }
    }
}

impl SignalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_reversal_recent_days < 0 {
            return Err(ConfigError::Invalid(
                "key_reversal_recent_days must be non-negative".into(),
            ));
        }
        self.key_reversal
            .validate()
            .and_then(|_| self.divergence.validate())
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocscan_core::indicators::{AtrMethod, SeedDirection};

    #[test]
    fn full_toml() {
        let toml = r#"
screens = [{ lookback = "20y", threshold_pct = 15.0 }, { lookback = "6mo", threshold_pct = 2.5 }]
trend_intervals = ["1d", "1wk"]
drawdown_since = "2005-01-01"
workers = 4
retries = 2

[engine]
atr_period = 14
multiplier = 2.5
bin_count = 100
atr_method = "rolling_range"
seed_direction = "from_close"
"#;
        let config = ScreenConfig::from_toml(toml).unwrap();
        assert_eq!(config.screens[1], ScreenSpec::new(Lookback::Months(6), 2.5));
        assert_eq!(config.trend_intervals, vec![Interval::Day1, Interval::Week1]);
        assert_eq!(config.drawdown_since, NaiveDate::from_ymd_opt(2005, 1, 1).unwrap());
        assert_eq!(config.worker_count(), 4);
        assert_eq!(config.retries, 2);
        assert_eq!(config.engine.atr_period, 14);
        assert_eq!(config.engine.atr_method, AtrMethod::RollingRange);
        assert_eq!(config.engine.seed_direction, SeedDirection::FromClose);
        assert_eq!(config.signals, SignalConfig::default());
    }

    #[test]
    fn signal_section() {
        let toml = r#"
[signals]
key_reversal_history = "3y"
key_reversal_recent_days = 14
divergence_history = "18mo"

[signals.key_reversal]
lookback = 3
rsi_period = 14

[signals.divergence]
window = 3
oversold = 30.0
"#;
        let signals = ScreenConfig::from_toml(toml).unwrap().signals;
        assert_eq!(signals.key_reversal_history, Lookback::Years(3));
        assert_eq!(signals.key_reversal_recent_days, 14);
        assert_eq!(signals.divergence_history, Lookback::Months(18));
        assert_eq!(signals.key_reversal.lookback, 3);
        assert_eq!(signals.key_reversal.rsi_period, 14);
        assert_eq!(signals.key_reversal.oversold, 30.0);
        assert_eq!(signals.divergence.window, 3);
        assert_eq!(signals.divergence.oversold, 30.0);
        assert_eq!(signals.divergence.max_gap_days, 42);
    }

    #[test]
    fn empty_toml_is_defaults() {
        let config = ScreenConfig::from_toml("").unwrap();
        assert_eq!(config, ScreenConfig::default());
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn invalid_values_rejected() {
        for toml in [
            "screens = []",
            "screens = [{ lookback = \"5y\", threshold_pct = -1.0 }]",
            "workers = 0",
            "retries = 11",
            "trend_intervals = [\"1d\", \"1d\"]",
            "[engine]\natr_period = 0",
            "[engine]\nbin_count = 1",
            "[engine]\nmultiplier = 0.0",
            "[signals]\nkey_reversal_recent_days = -1",
            "[signals.key_reversal]\nlookback = 0",
            "[signals.divergence]\noversold = 80.0",
        ] {
            assert!(
                matches!(ScreenConfig::from_toml(toml), Err(ConfigError::Invalid(_))),
                "accepted: {toml}"
            );
        }
        assert!(matches!(
            ScreenConfig::from_toml("screens = [{ lookback = \"5x\", threshold_pct = 1.0 }]"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn screen_spec_from_cli() {
        let spec: ScreenSpec = "5y:5".parse().unwrap();
        assert_eq!(spec, ScreenSpec::new(Lookback::Years(5), 5.0));
        assert_eq!(spec.to_string(), "5y:5");
        let spec: ScreenSpec = " max : 12.5 ".parse().unwrap();
        assert_eq!(spec.lookback, Lookback::Max);
        for bad in ["5y", "5y:", "abc:5", "5y:x"] {
            assert!(bad.parse::<ScreenSpec>().is_err(), "{bad}");
        }
    }
}
