//! Benchmarks for zone scanning and multi-timeframe analysis.

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use zonescope::prelude::*;

/// Generate realistic bars with deterministic pseudo-random moves
fn generate_bars(n: usize, step_days: i64) -> Vec<Bar> {
  let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
  let mut bars = Vec::with_capacity(n);
  let mut price = 100.0;

  for i in 0..n {
    let change = ((i * 7 + 13) % 100) as f64 / 25.0 - 2.0;
    let gap = if i % 37 == 0 { price * 0.04 } else { 0.0 };
    let volatility = 0.5 + ((i * 3) % 10) as f64 / 5.0;

    let o = price + gap;
    let c = (o + change).max(1.0);
    let h = o.max(c) + volatility * 0.5;
    let l = (o.min(c) - volatility * 0.5).max(0.5);

    bars.push(Bar::new(start + Duration::days(i as i64 * step_days), o, h, l, c));
    price = c;
  }

  bars
}

fn bench_classify(c: &mut Criterion) {
  let bars = generate_bars(1000, 1);
  let config = ClassifierConfig::default();

  c.bench_function("classify_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(classify(black_box(&bars), &config));
    })
  });
}

fn bench_scan_interval(c: &mut Criterion) {
  let bars = generate_bars(1000, 1);
  let engine = EngineBuilder::new().build().unwrap();

  c.bench_function("scan_interval_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(engine.scan_interval(black_box(&bars), Interval::OneDay));
    })
  });
}

fn bench_scaling(c: &mut Criterion) {
  let engine = EngineBuilder::new().build().unwrap();

  let mut group = c.benchmark_group("scaling");

  for size in [100, 500, 1000, 5000].iter() {
    let bars = generate_bars(*size, 1);

    group.bench_with_input(BenchmarkId::new("scan_interval", size), size, |b, _| {
      b.iter(|| {
        let _ = black_box(engine.scan_interval(black_box(&bars), Interval::OneDay));
      })
    });
  }

  group.finish();
}

fn bench_analyze(c: &mut Criterion) {
  let quarterly = generate_bars(40, 91);
  let monthly = generate_bars(120, 30);
  let weekly = generate_bars(520, 7);
  let daily = generate_bars(2500, 1);

  let engine = EngineBuilder::new().build().unwrap();
  let series = [
    (Interval::ThreeMonths, quarterly.as_slice()),
    (Interval::OneMonth, monthly.as_slice()),
    (Interval::OneWeek, weekly.as_slice()),
    (Interval::OneDay, daily.as_slice()),
  ];

  c.bench_function("analyze_four_timeframes", |b| {
    b.iter(|| {
      let analysis = engine.analyze(black_box(&series)).unwrap();
      black_box(analysis.summary("BENCH"))
    })
  });
}

fn bench_parallel_scan(c: &mut Criterion) {
  let monthly = generate_bars(120, 30);
  let daily = generate_bars(2500, 1);
  let series = [(Interval::OneMonth, monthly.as_slice()), (Interval::OneDay, daily.as_slice())];

  let engine = EngineBuilder::new().build().unwrap();

  let instruments: Vec<(&str, &[(Interval, &[Bar])])> =
    vec![("SYM1", &series), ("SYM2", &series), ("SYM3", &series), ("SYM4", &series)];

  c.bench_function("parallel_analyze_4_instruments", |b| {
    b.iter(|| {
      let _ = black_box(scan_parallel(black_box(&engine), black_box(instruments.clone())));
    })
  });
}

criterion_group!(
  benches,
  bench_classify,
  bench_scan_interval,
  bench_scaling,
  bench_analyze,
  bench_parallel_scan,
);

criterion_main!(benches);
