//! Engine parameters, passed explicitly into every engine call.

use serde::{Deserialize, Serialize};

use crate::error::ScreenError;
use crate::indicators::atr::AtrMethod;
use crate::indicators::supertrend::{SeedDirection, SupertrendParams};

pub const DEFAULT_ATR_PERIOD: usize = 10;
pub const DEFAULT_MULTIPLIER: f64 = 3.0;
pub const DEFAULT_BIN_COUNT: usize = 200;

/// Numeric knobs shared by the POC and SuperTrend engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    pub atr_period: usize,
    pub multiplier: f64,
    /// Number of histogram edges; the profile has `bin_count - 1` bins.
    pub bin_count: usize,
    pub atr_method: AtrMethod,
    pub seed_direction: SeedDirection,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            atr_period: DEFAULT_ATR_PERIOD,
            multiplier: DEFAULT_MULTIPLIER,
            bin_count: DEFAULT_BIN_COUNT,
            atr_method: AtrMethod::Wilder,
            seed_direction: SeedDirection::Up,
        }
    }
}

impl EngineParams {
    pub fn supertrend(&self) -> SupertrendParams {
        SupertrendParams {
            atr_period: self.atr_period,
            multiplier: self.multiplier,
            atr_method: self.atr_method,
            seed: self.seed_direction,
        }
    }

    pub fn validate(&self) -> Result<(), ScreenError> {
        self.supertrend().validate()?;
        if self.bin_count < 2 {
            return Err(ScreenError::InvalidParameter(format!(
                "bin_count must be >= 2, got {}",
                self.bin_count
            )));
        }
        Ok(())
    }
}
