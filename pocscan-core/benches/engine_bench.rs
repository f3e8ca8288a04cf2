//! Criterion benchmarks for the screening hot paths.
//!
//! Benchmarks:
//! 1. Volume profile / POC over a 5-year daily window at several bin counts
//! 2. SuperTrend state machine (Wilder and rolling-range ATR)
//! 3. Drawdown over a multi-decade close series
//! 4. Ingest of raw provider bars into a validated series
//! 5. RSI signal engines (key reversals, divergences)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use pocscan_core::data::{ingest_series, RawBar, SyntheticProvider};
use pocscan_core::domain::{Bar, Interval};
use pocscan_core::indicators::{
    build_volume_profile, compute_drawdown, compute_supertrend, key_reversals, rsi_divergences,
    AtrMethod, DivergenceParams, KeyReversalParams, SupertrendParams,
};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_raw_bars(n: usize) -> Vec<RawBar> {
    let end = chrono::NaiveDate::from_ymd_opt(2024, 6, 28)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let start = end - chrono::Duration::days((n as i64) * 7 / 5 + 7);
    let mut bars = SyntheticProvider::generate("BENCH", Interval::Day1, start, end);
    bars.truncate(n);
    bars
}

fn make_bars(n: usize) -> Vec<Bar> {
    ingest_series("BENCH", Interval::Day1, make_raw_bars(n))
        .unwrap()
        .series
        .bars()
        .to_vec()
}

// ── 1. Volume profile ────────────────────────────────────────────────

fn bench_volume_profile(c: &mut Criterion) {
    let bars = make_bars(1260);
    let mut group = c.benchmark_group("volume_profile");
    for bins in [50usize, 200, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(bins), &bins, |b, &bins| {
            b.iter(|| build_volume_profile(black_box(&bars), bins).unwrap())
        });
    }
    group.finish();
}

// ── 2. SuperTrend ────────────────────────────────────────────────────

fn bench_supertrend(c: &mut Criterion) {
    let bars = make_bars(2500);
    let mut group = c.benchmark_group("supertrend");
    for method in [AtrMethod::Wilder, AtrMethod::RollingRange] {
        let params = SupertrendParams {
            atr_method: method,
            ..Default::default()
        };
        group.bench_function(format!("{method:?}"), |b| {
            b.iter(|| compute_supertrend(black_box(&bars), &params).unwrap())
        });
    }
    group.finish();
}

// ── 3. Drawdown ──────────────────────────────────────────────────────

fn bench_drawdown(c: &mut Criterion) {
    let closes: Vec<f64> = make_bars(6000).iter().map(|b| b.close).collect();
    c.bench_function("drawdown_6000", |b| {
        b.iter(|| compute_drawdown(black_box(&closes)).unwrap())
    });
}

// ── 4. Ingest ────────────────────────────────────────────────────────

fn bench_ingest(c: &mut Criterion) {
    let raw = make_raw_bars(2500);
    c.bench_function("ingest_2500", |b| {
        b.iter(|| ingest_series("BENCH", Interval::Day1, black_box(raw.clone())).unwrap())
    });
}

// ── 5. Signals ───────────────────────────────────────────────────────

fn bench_signals(c: &mut Criterion) {
    let bars = make_bars(2500);
    let as_of = bars[bars.len() - 1].timestamp;
    let mut group = c.benchmark_group("signals");
    group.bench_function("key_reversals", |b| {
        b.iter(|| key_reversals(black_box(&bars), &KeyReversalParams::default()).unwrap())
    });
    group.bench_function("rsi_divergences", |b| {
        b.iter(|| rsi_divergences(black_box(&bars), &DivergenceParams::default(), as_of).unwrap())
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_volume_profile,
    bench_supertrend,
    bench_drawdown,
    bench_ingest,
    bench_signals
);
criterion_main!(benches);
