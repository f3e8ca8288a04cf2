//! Criterion benchmarks for batch screening over the synthetic provider.
//!
//! Run with: `cargo bench -p pocscan-runner`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use chrono::NaiveDate;
use pocscan_core::data::SyntheticProvider;
use pocscan_core::domain::{Instrument, Interval, Lookback};
use pocscan_runner::{ScreenConfig, ScreenSpec, Screener};

fn screener(workers: usize) -> Screener {
    let as_of = NaiveDate::from_ymd_opt(2024, 6, 28)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    let config = ScreenConfig {
        screens: vec![ScreenSpec::new(Lookback::Years(5), 10_000.0)],
        trend_intervals: vec![Interval::Day1, Interval::Week1],
        workers: Some(workers),
        ..Default::default()
    };
    Screener::new(Arc::new(SyntheticProvider::new()), config, as_of).unwrap()
}

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_20_instruments");
    group.sample_size(10);
    let instruments: Vec<Instrument> = (0..20)
        .map(|i| Instrument::new(format!("SYM{i:02}"), "Bench"))
        .collect();

    for workers in [1usize, 4] {
        let screener = screener(workers);
        let screen = screener.config().screens[0];
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, _| {
            b.iter(|| black_box(screener.run_batch(black_box(&instruments), screen)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_batch);
criterion_main!(benches);
