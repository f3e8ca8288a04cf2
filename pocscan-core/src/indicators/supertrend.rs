//! Supertrend: ATR-band trend state, evolved bar by bar.
//!
//! Inherently sequential: final bands ratchet toward price while the prior close
//! stays on their side, and the direction flips only when the close crosses the
//! opposite band of the previous bar.
//!
//! Lookback: atr_period. The first state lives at index `atr_period`; earlier
//! bars carry no state and are never back-filled.

use serde::{Deserialize, Serialize};

use super::atr::{compute_atr, true_range, AtrMethod};
use super::indicator::Indicator;
use crate::domain::Bar;
use crate::error::ScreenError;

/// Below this magnitude a trend value is treated as zero for percentage math.
pub const TREND_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

/// How the direction is chosen on the first bar with a defined ATR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedDirection {
    /// Always start trending up, on the lower band.
    #[default]
    Up,
    /// Up if the first close sits at or above the band midpoint, else Down.
    FromClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SupertrendParams {
    pub atr_period: usize,
    pub multiplier: f64,
    pub atr_method: AtrMethod,
    pub seed: SeedDirection,
}

impl Default for SupertrendParams {
    fn default() -> Self {
        Self {
            atr_period: 10,
            multiplier: 3.0,
            atr_method: AtrMethod::Wilder,
            seed: SeedDirection::Up,
        }
    }
}

impl SupertrendParams {
    pub fn validate(&self) -> Result<(), ScreenError> {
        if self.atr_period == 0 {
            return Err(ScreenError::InvalidParameter(
                "atr_period must be >= 1".into(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier <= 0.0 {
            return Err(ScreenError::InvalidParameter(format!(
                "multiplier must be a positive finite number, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }
}

/// Full per-bar state from the first valid ATR index onward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SupertrendState {
    /// Index of the bar this state belongs to.
    pub index: usize,
    pub true_range: f64,
    pub atr: f64,
    pub basic_upper: f64,
    pub basic_lower: f64,
    pub final_upper: f64,
    pub final_lower: f64,
    pub direction: Direction,
    pub trend_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupertrendSeries {
    first_index: usize,
    states: Vec<SupertrendState>,
}

impl SupertrendSeries {
    /// Bar index of the first state.
    pub fn first_index(&self) -> usize {
        self.first_index
    }

    pub fn states(&self) -> &[SupertrendState] {
        &self.states
    }

    /// State on the most recent bar. Series are never empty.
    pub fn last(&self) -> &SupertrendState {
        &self.states[self.states.len() - 1]
    }

    pub fn directions(&self) -> Vec<Direction> {
        self.states.iter().map(|s| s.direction).collect()
    }

    pub fn trend_values(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.trend_value).collect()
    }

    /// Bar indices where the direction differs from the previous bar.
    pub fn flips(&self) -> Vec<usize> {
        self.states
            .windows(2)
            .filter(|w| w[0].direction != w[1].direction)
            .map(|w| w[1].index)
            .collect()
    }

    /// Trend values aligned to `len` bars, NaN before the first state.
    pub fn padded_trend_values(&self, len: usize) -> Vec<f64> {
        let mut out = vec![f64::NAN; len];
        for s in &self.states {
            if s.index < len {
                out[s.index] = s.trend_value;
            }
        }
        out
    }
}

/// Run the SuperTrend state machine over `bars`.
///
/// Needs at least `atr_period + 1` bars. Non-finite prices or ATR values at or
/// after the first state are a [`ScreenError::ComputationError`].
pub fn compute_supertrend(
    bars: &[Bar],
    params: &SupertrendParams,
) -> Result<SupertrendSeries, ScreenError> {
    params.validate()?;
    let first = params.atr_period;
    let n = bars.len();
    if n <= first {
        return Err(ScreenError::InsufficientHistory {
            required: first + 1,
            available: n,
        });
    }

    let tr = true_range(bars);
    let atr = compute_atr(bars, params.atr_period, params.atr_method);
    if atr[first..].iter().all(|v| v.is_nan()) {
        return Err(ScreenError::ComputationError(
            "ATR undefined over the whole series (missing price data)".into(),
        ));
    }

    let mut states: Vec<SupertrendState> = Vec::with_capacity(n - first);
    for i in first..n {
        let bar = &bars[i];
        if atr[i].is_nan() || bar.is_void() {
            return Err(ScreenError::ComputationError(format!(
                "non-finite input at bar {i}"
            )));
        }
        let mid = bar.hl2();
        let basic_upper = mid + params.multiplier * atr[i];
        let basic_lower = mid - params.multiplier * atr[i];

        let state = match states.last() {
            None => {
                let direction = match params.seed {
                    SeedDirection::Up => Direction::Up,
                    SeedDirection::FromClose if bar.close >= mid => Direction::Up,
                    SeedDirection::FromClose => Direction::Down,
                };
                let trend_value = match direction {
                    Direction::Up => basic_lower,
                    Direction::Down => basic_upper,
                };
                SupertrendState {
                    index: i,
                    true_range: tr[i],
                    atr: atr[i],
                    basic_upper,
                    basic_lower,
                    final_upper: basic_upper,
                    final_lower: basic_lower,
                    direction,
                    trend_value,
                }
            }
            Some(prev) => {
                let prev_close = bars[i - 1].close;

                // Upper band only tightens while the prior close stayed below it.
                let final_upper = if prev_close <= prev.final_upper {
                    basic_upper.min(prev.final_upper)
                } else {
                    basic_upper
                };
                // Lower band only tightens while the prior close stayed above it.
                let final_lower = if prev_close >= prev.final_lower {
                    basic_lower.max(prev.final_lower)
                } else {
                    basic_lower
                };

                let direction = if bar.close > prev.final_upper {
                    Direction::Up
                } else if bar.close < prev.final_lower {
                    Direction::Down
                } else {
                    prev.direction
                };
                let trend_value = match direction {
                    Direction::Up => final_lower,
                    Direction::Down => final_upper,
                };
                SupertrendState {
                    index: i,
                    true_range: tr[i],
                    atr: atr[i],
                    basic_upper,
                    basic_lower,
                    final_upper,
                    final_lower,
                    direction,
                    trend_value,
                }
            }
        };
        states.push(state);
    }

    Ok(SupertrendSeries {
        first_index: first,
        states,
    })
}

/// Percentage distance of `close` from the trend line.
///
/// Divides by the trend value, or by `close` when the trend value is ~0.
/// `None` if inputs are non-finite or both denominators are ~0.
pub fn trend_delta_pct(close: f64, trend_value: f64) -> Option<f64> {
    if !close.is_finite() || !trend_value.is_finite() {
        return None;
    }
    let denominator = if trend_value.abs() >= TREND_EPSILON {
        trend_value
    } else if close.abs() >= TREND_EPSILON {
        close
    } else {
        return None;
    };
    Some((close - trend_value) / denominator * 100.0)
}

#[derive(Debug, Clone)]
pub struct Supertrend {
    params: SupertrendParams,
    name: String,
}

impl Supertrend {
    pub fn new(period: usize, multiplier: f64) -> Self {
        Self::with_params(SupertrendParams {
            atr_period: period,
            multiplier,
            ..Default::default()
        })
    }

    pub fn with_params(params: SupertrendParams) -> Self {
        assert!(params.atr_period >= 1, "Supertrend period must be >= 1");
        Self {
            name: format!("supertrend_{}_{}", params.atr_period, params.multiplier),
            params,
        }
    }
}

impl Indicator for Supertrend {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.params.atr_period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        match compute_supertrend(bars, &self.params) {
            Ok(series) => series.padded_trend_values(bars.len()),
            Err(_) => vec![f64::NAN; bars.len()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_bars, DEFAULT_EPSILON};

    fn params(period: usize, multiplier: f64) -> SupertrendParams {
        SupertrendParams {
            atr_period: period,
            multiplier,
            ..Default::default()
        }
    }

    #[test]
    fn constant_range_constant_close_never_flips() {
        // high - low = 2 and close fixed: ATR converges to 2, bands stay put.
        let bars = make_ohlc_bars(&[(50.0, 51.0, 49.0, 50.0); 20]);
        let st = compute_supertrend(&bars, &params(10, 3.0)).unwrap();

        assert_eq!(st.first_index(), 10);
        assert_eq!(st.states().len(), 10);
        for s in st.states() {
            assert_approx(s.atr, 2.0, DEFAULT_EPSILON);
            assert_approx(s.final_upper, 56.0, DEFAULT_EPSILON);
            assert_approx(s.final_lower, 44.0, DEFAULT_EPSILON);
            assert_eq!(s.direction, Direction::Up);
            assert_approx(s.trend_value, 44.0, DEFAULT_EPSILON);
        }
        assert!(st.flips().is_empty());
    }

    #[test]
    fn seed_is_up_on_lower_band() {
        let bars = make_ohlc_bars(&[(50.0, 51.0, 49.0, 50.0); 4]);
        let st = compute_supertrend(&bars, &params(3, 3.0)).unwrap();
        let first = &st.states()[0];
        assert_eq!(first.direction, Direction::Up);
        assert_eq!(first.trend_value, first.final_lower);
    }

    #[test]
    fn seed_from_close_can_start_down() {
        let mut data = vec![(50.0, 51.0, 49.0, 50.0); 4];
        data[3] = (50.0, 51.0, 49.0, 49.2); // close below hl2
        let bars = make_ohlc_bars(&data);
        let p = SupertrendParams {
            seed: SeedDirection::FromClose,
            ..params(3, 3.0)
        };
        let st = compute_supertrend(&bars, &p).unwrap();
        assert_eq!(st.states()[0].direction, Direction::Down);
        assert_eq!(st.states()[0].trend_value, st.states()[0].final_upper);
    }

    #[test]
    fn flips_down_when_close_breaks_prior_lower_band() {
        let mut data = vec![(100.0, 101.0, 99.0, 100.0); 8];
        data.push((90.0, 91.0, 80.0, 81.0)); // crash through lower band (94)
        let bars = make_ohlc_bars(&data);
        let st = compute_supertrend(&bars, &params(3, 3.0)).unwrap();

        let prev = st.states()[st.states().len() - 2];
        let last = st.last();
        assert!(bars[8].close < prev.final_lower);
        assert_eq!(last.direction, Direction::Down);
        assert_eq!(last.trend_value, last.final_upper);
        assert_eq!(st.flips(), vec![8]);
    }

    #[test]
    fn upper_band_ratchets_down_only() {
        // Falling closes stay below the upper band, so it may only decrease.
        let data: Vec<_> = (0..15)
            .map(|i| {
                let base = 200.0 - i as f64 * 3.0;
                (base + 1.0, base + 3.0, base - 3.0, base - 1.0)
            })
            .collect();
        let bars = make_ohlc_bars(&data);
        let st = compute_supertrend(&bars, &params(3, 2.0)).unwrap();
        for w in st.states().windows(2) {
            if bars[w[1].index - 1].close <= w[0].final_upper {
                assert!(w[1].final_upper <= w[0].final_upper);
            }
        }
        assert_eq!(st.last().direction, Direction::Down);
    }

    #[test]
    fn uptrend_trend_line_below_price() {
        let data: Vec<_> = (0..15)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                (base - 1.0, base + 3.0, base - 3.0, base + 1.0)
            })
            .collect();
        let bars = make_ohlc_bars(&data);
        let st = compute_supertrend(&bars, &params(3, 2.0)).unwrap();
        for s in st.states() {
            assert_eq!(s.direction, Direction::Up);
            assert!(s.trend_value < bars[s.index].close);
        }
    }

    #[test]
    fn too_few_bars() {
        // Exactly atr_period bars leaves no bar with a defined ATR.
        let bars = make_ohlc_bars(&[(100.0, 105.0, 95.0, 102.0); 3]);
        let err = compute_supertrend(&bars, &params(3, 2.0)).unwrap_err();
        assert_eq!(
            err,
            ScreenError::InsufficientHistory {
                required: 4,
                available: 3
            }
        );
        let bars = make_ohlc_bars(&[(100.0, 105.0, 95.0, 102.0); 4]);
        let st = compute_supertrend(&bars, &params(3, 2.0)).unwrap();
        assert_eq!(st.states().len(), 1);
        assert_eq!(st.last().index, 3);
    }

    #[test]
    fn nan_prices_are_a_computation_error() {
        let mut bars = make_ohlc_bars(&[(100.0, 105.0, 95.0, 102.0); 6]);
        bars[1].high = f64::NAN;
        let err = compute_supertrend(&bars, &params(3, 2.0)).unwrap_err();
        assert!(matches!(err, ScreenError::ComputationError(_)));
    }

    #[test]
    fn rejects_bad_params() {
        let bars = make_ohlc_bars(&[(100.0, 105.0, 95.0, 102.0); 6]);
        assert!(matches!(
            compute_supertrend(&bars, &params(0, 3.0)),
            Err(ScreenError::InvalidParameter(_))
        ));
        assert!(matches!(
            compute_supertrend(&bars, &params(3, f64::NAN)),
            Err(ScreenError::InvalidParameter(_))
        ));
    }

    #[test]
    fn rolling_range_variant_runs() {
        let bars = make_ohlc_bars(&[(50.0, 51.0, 49.0, 50.0); 12]);
        let p = SupertrendParams {
            atr_method: AtrMethod::RollingRange,
            ..params(5, 3.0)
        };
        let st = compute_supertrend(&bars, &p).unwrap();
        assert_approx(st.last().atr, 2.0, DEFAULT_EPSILON);
    }

    #[test]
    fn indicator_pads_warmup_with_nan() {
        let bars = make_ohlc_bars(&[(50.0, 51.0, 49.0, 50.0); 6]);
        let values = Supertrend::new(3, 3.0).compute(&bars);
        assert_eq!(values.len(), 6);
        assert!(values[..3].iter().all(|v| v.is_nan()));
        assert!(values[3..].iter().all(|v| v.is_finite()));
    }

    #[test]
    fn delta_pct_uses_trend_denominator() {
        assert_approx(trend_delta_pct(110.0, 100.0).unwrap(), 10.0, DEFAULT_EPSILON);
        assert_approx(trend_delta_pct(90.0, 100.0).unwrap(), -10.0, DEFAULT_EPSILON);
    }

    #[test]
    fn delta_pct_falls_back_to_close() {
        assert_approx(trend_delta_pct(50.0, 0.0).unwrap(), 100.0, DEFAULT_EPSILON);
        assert_eq!(trend_delta_pct(0.0, 0.0), None);
        assert_eq!(trend_delta_pct(f64::NAN, 1.0), None);
    }
}
