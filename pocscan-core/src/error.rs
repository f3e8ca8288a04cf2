//! Error taxonomy for the screening engines.
//!
//! Engines never panic on bad input; they return one of these kinds so the
//! orchestrator can log the failing unit and move on.

use thiserror::Error;

use crate::data::DataError;
use crate::domain::SeriesError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScreenError {
    /// Provider returned nothing usable for the request.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("insufficient history: need {required} bars, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    /// Every bar traded at one price, so no histogram can be built.
    #[error("degenerate price range: min == max == {price}")]
    DegenerateRange { price: f64 },

    #[error("no bar contributed volume to the profile")]
    NoVolume,

    #[error("computation error: {0}")]
    ComputationError(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ScreenError {
    /// Stable short tag for logs and exported failure lists.
    pub fn kind(&self) -> &'static str {
        match self {
            ScreenError::DataUnavailable(_) => "data_unavailable",
            ScreenError::InsufficientHistory { .. } => "insufficient_history",
            ScreenError::DegenerateRange { .. } => "degenerate_range",
            ScreenError::NoVolume => "no_volume",
            ScreenError::ComputationError(_) => "computation_error",
            ScreenError::InvalidParameter(_) => "invalid_parameter",
        }
    }
}

impl From<DataError> for ScreenError {
    fn from(e: DataError) -> Self {
        ScreenError::DataUnavailable(e.to_string())
    }
}

impl From<SeriesError> for ScreenError {
    fn from(e: SeriesError) -> Self {
        ScreenError::DataUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_error_maps_to_unavailable() {
        let err: ScreenError = DataError::Empty {
            symbol: "XYZ".into(),
        }
        .into();
        assert_eq!(err.kind(), "data_unavailable");
        assert!(err.to_string().contains("XYZ"));
    }

    #[test]
    fn kinds_are_distinct() {
        let kinds = [
            ScreenError::DataUnavailable(String::new()).kind(),
            ScreenError::InsufficientHistory {
                required: 1,
                available: 0,
            }
            .kind(),
            ScreenError::DegenerateRange { price: 1.0 }.kind(),
            ScreenError::NoVolume.kind(),
            ScreenError::ComputationError(String::new()).kind(),
            ScreenError::InvalidParameter(String::new()).kind(),
        ];
        let mut unique = kinds.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), kinds.len());
    }
}
