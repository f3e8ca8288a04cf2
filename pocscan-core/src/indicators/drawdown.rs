//! Drawdown analysis over a close-price sequence.
//!
//! drawdown[i] = (running_max[i] - close[i]) / running_max[i] * 100, in [0, 100].
//! Closes may fall to 0 once the running peak is positive.

use serde::{Deserialize, Serialize};

use crate::error::ScreenError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawdownSummary {
    pub all_time_high: f64,
    pub max_drawdown_pct: f64,
    pub avg_drawdown_pct: f64,
    pub current_drawdown_pct: f64,
}

/// Per-bar drawdown in percent from the running peak.
pub fn drawdown_series(closes: &[f64]) -> Result<Vec<f64>, ScreenError> {
    if closes.is_empty() {
        return Err(ScreenError::InsufficientHistory {
            required: 1,
            available: 0,
        });
    }
    if let Some(bad) = closes.iter().find(|c| !c.is_finite() || **c < 0.0) {
        return Err(ScreenError::ComputationError(format!(
            "drawdown needs finite non-negative closes, got {bad}"
        )));
    }

    let mut peak = f64::NEG_INFINITY;
    let mut out = Vec::with_capacity(closes.len());
    for &c in closes {
        peak = peak.max(c);
        if peak <= 0.0 {
            return Err(ScreenError::ComputationError(
                "drawdown undefined while the running peak is 0".into(),
            ));
        }
        out.push((peak - c) / peak * 100.0);
    }
    Ok(out)
}

pub fn compute_drawdown(closes: &[f64]) -> Result<DrawdownSummary, ScreenError> {
    let dd = drawdown_series(closes)?;
    let all_time_high = closes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let max_drawdown_pct = dd.iter().copied().fold(0.0, f64::max);
    let avg_drawdown_pct = dd.iter().sum::<f64>() / dd.len() as f64;
    let current_drawdown_pct = dd[dd.len() - 1];

    Ok(DrawdownSummary {
        all_time_high,
        max_drawdown_pct,
        avg_drawdown_pct,
        current_drawdown_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn known_drawdown() {
        // Peak 100 -> 80 (20%) -> recovers to 90 (10%)
        let s = compute_drawdown(&[50.0, 100.0, 80.0, 90.0]).unwrap();
        assert_eq!(s.all_time_high, 100.0);
        assert_approx(s.max_drawdown_pct, 20.0, DEFAULT_EPSILON);
        assert_approx(s.avg_drawdown_pct, 7.5, DEFAULT_EPSILON);
        assert_approx(s.current_drawdown_pct, 10.0, DEFAULT_EPSILON);
    }

    #[test]
    fn monotonic_increase_has_no_drawdown() {
        let s = compute_drawdown(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(s.max_drawdown_pct, 0.0);
        assert_eq!(s.current_drawdown_pct, 0.0);
        assert_eq!(s.all_time_high, 4.0);
    }

    #[test]
    fn current_is_zero_at_new_high() {
        let s = compute_drawdown(&[10.0, 5.0, 12.0]).unwrap();
        assert_eq!(s.current_drawdown_pct, 0.0);
        assert_approx(s.max_drawdown_pct, 50.0, DEFAULT_EPSILON);
    }

    #[test]
    fn single_close() {
        let s = compute_drawdown(&[42.0]).unwrap();
        assert_eq!(s.all_time_high, 42.0);
        assert_eq!(s.max_drawdown_pct, 0.0);
        assert_eq!(s.avg_drawdown_pct, 0.0);
    }

    #[test]
    fn empty_is_an_error() {
        assert!(matches!(
            compute_drawdown(&[]),
            Err(ScreenError::InsufficientHistory { .. })
        ));
    }

    #[test]
    fn close_at_zero_is_full_drawdown() {
        let s = compute_drawdown(&[10.0, 0.0]).unwrap();
        assert_eq!(s.current_drawdown_pct, 100.0);
        assert_eq!(s.max_drawdown_pct, 100.0);

        let s = compute_drawdown(&[10.0, 5.0, 0.0]).unwrap();
        assert_eq!(s.current_drawdown_pct, 100.0);
        assert_approx(s.avg_drawdown_pct, 50.0, DEFAULT_EPSILON);
    }

    #[test]
    fn zero_peak_or_bad_close_is_an_error() {
        for closes in [
            &[0.0, 5.0][..],
            &[0.0][..],
            &[10.0, -1.0][..],
            &[10.0, f64::NAN][..],
            &[10.0, f64::INFINITY][..],
        ] {
            assert!(
                matches!(compute_drawdown(closes), Err(ScreenError::ComputationError(_))),
                "accepted {closes:?}"
            );
        }
    }
}
