//! Volume profile and point of control (POC).
//!
//! `bin_count` edges subdivide `[min(low), max(high)]` linearly into
//! `bin_count - 1` bins. Each bar with `high > low` and positive volume spreads its
//! volume in equal shares over the bins it covers (not weighted by overlap). The
//! POC is the midpoint of the heaviest bin, lowest bin on ties.
//!
//! Per-bar spreading is done on a difference array so a bar costs two binary
//! searches regardless of how many bins it spans.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::error::ScreenError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeProfile {
    edges: Vec<f64>,
    volumes: Vec<f64>,
    total_volume: f64,
    poc_index: usize,
}

impl VolumeProfile {
    /// Bin edges, strictly increasing, `bin_count` of them.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Aggregated volume per bin (`edges.len() - 1` entries).
    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }

    pub fn bin_count(&self) -> usize {
        self.volumes.len()
    }

    /// Sum of the volume of every contributing bar.
    pub fn total_volume(&self) -> f64 {
        self.total_volume
    }

    pub fn poc_index(&self) -> usize {
        self.poc_index
    }

    pub fn poc_price(&self) -> f64 {
        (self.edges[self.poc_index] + self.edges[self.poc_index + 1]) / 2.0
    }

    pub fn price_min(&self) -> f64 {
        self.edges[0]
    }

    pub fn price_max(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }
}

/// `n` evenly spaced values from `start` to `end`, both inclusive.
fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    let step = (end - start) / (n - 1) as f64;
    let mut edges: Vec<f64> = (0..n).map(|k| start + step * k as f64).collect();
    edges[n - 1] = end;
    edges
}

/// Build the volume histogram for `bars` with `bin_count` edges.
pub fn build_volume_profile(bars: &[Bar], bin_count: usize) -> Result<VolumeProfile, ScreenError> {
    if bin_count < 2 {
        return Err(ScreenError::InvalidParameter(format!(
            "bin_count must be >= 2, got {bin_count}"
        )));
    }
    if bars.is_empty() {
        return Err(ScreenError::InsufficientHistory {
            required: 1,
            available: 0,
        });
    }

    let price_min = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let price_max = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    if !price_min.is_finite() || !price_max.is_finite() {
        return Err(ScreenError::ComputationError(
            "non-finite price bounds".into(),
        ));
    }
    if price_min == price_max {
        return Err(ScreenError::DegenerateRange { price: price_min });
    }

    let edges = linspace(price_min, price_max, bin_count);
    let last_bin = bin_count - 2;
    // delta[k] adds to bins k.., delta[k + span] removes it again.
    let mut delta = vec![0.0_f64; bin_count];
    let mut total_volume = 0.0;

    for bar in bars {
        if !(bar.high > bar.low && bar.volume > 0.0) {
            continue;
        }
        // Bin whose left edge is the last one <= low.
        let low_idx = edges
            .partition_point(|e| *e <= bar.low)
            .saturating_sub(1)
            .min(last_bin);
        // First edge >= high; bins [low_idx, high_idx) are covered.
        let high_idx = edges.partition_point(|e| *e < bar.high).min(bin_count - 1);

        if high_idx > low_idx {
            let share = bar.volume / (high_idx - low_idx) as f64;
            delta[low_idx] += share;
            delta[high_idx] -= share;
        } else {
            delta[low_idx] += bar.volume;
            delta[low_idx + 1] -= bar.volume;
        }
        total_volume += bar.volume;
    }

    if total_volume <= 0.0 {
        return Err(ScreenError::NoVolume);
    }

    let mut volumes = Vec::with_capacity(bin_count - 1);
    let mut running = 0.0;
    for d in &delta[..bin_count - 1] {
        running += d;
        // Prefix sums of cancelling shares may leave float dust below zero.
        volumes.push(running.max(0.0));
    }

    let mut poc_index = 0;
    for (i, v) in volumes.iter().enumerate() {
        if *v > volumes[poc_index] {
            poc_index = i;
        }
    }

    Ok(VolumeProfile {
        edges,
        volumes,
        total_volume,
        poc_index,
    })
}

/// Price of the point of control for `bars`.
pub fn compute_poc(bars: &[Bar], bin_count: usize) -> Result<f64, ScreenError> {
    build_volume_profile(bars, bin_count).map(|p| p.poc_price())
}

/// Signed distance of `price` from `poc` in percent of the POC.
pub fn distance_pct(price: f64, poc: f64) -> f64 {
    (price - poc) / poc * 100.0
}

/// Screening filter: keep when `|distance| <= threshold` (inclusive).
pub fn within_threshold(distance_pct: f64, threshold_pct: f64) -> bool {
    distance_pct.abs() <= threshold_pct
}
