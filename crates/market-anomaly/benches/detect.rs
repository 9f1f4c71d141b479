//! Benchmarks for the detection pipeline and the heavier leaf detectors.

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use maple_market_anomaly::detectors::{StatisticalDetector, TimeSeriesDetector};
use maple_market_anomaly::{AnomalyOrchestrator, DetectionConfig, DetectionOverrides, TimeSeriesPoint};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn create_test_series(size: usize) -> Vec<TimeSeriesPoint> {
    let start = Utc::now();
    (0..size)
        .map(|i| {
            let trend = i as f64 * 0.05;
            let noise = (i as f64 * 0.3).sin() * 3.0;
            let spike = if i % 250 == 125 { 40.0 } else { 0.0 };
            TimeSeriesPoint::new(
                start + Duration::minutes(i as i64),
                100.0 + trend + noise + spike,
                1_000.0 + (i as f64 * 0.7).cos() * 50.0,
            )
        })
        .collect()
}

fn bench_detect(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("detect");

    for size in [100, 500, 1000].iter() {
        let points = create_test_series(*size);
        // zero cooldown so every iteration runs the full commit path
        let overrides = DetectionOverrides::default().with_cooldown_ms(0);

        group.bench_with_input(BenchmarkId::new("orchestrator", size), &points, |b, points| {
            let engine = AnomalyOrchestrator::with_defaults().with_rng_seed(1);
            b.iter(|| {
                runtime
                    .block_on(engine.detect("BENCH", black_box(points), &overrides))
                    .expect("detect")
            });
        });
    }

    group.finish();
}

fn bench_leaf_detectors(c: &mut Criterion) {
    let points = create_test_series(1000);
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let config = DetectionConfig::default();

    c.bench_function("isolation_scores_1k", |b| {
        let mut rng = StdRng::seed_from_u64(7);
        b.iter(|| StatisticalDetector::isolation_scores(black_box(&values), 0.1, &mut rng))
    });
    c.bench_function("trend_changes_1k", |b| {
        b.iter(|| TimeSeriesDetector::trend_changes(black_box(&values), config.trend_window_size))
    });
    c.bench_function("volatility_spikes_1k", |b| {
        b.iter(|| TimeSeriesDetector::volatility_spikes(black_box(&values), &config))
    });
}

criterion_group!(benches, bench_detect, bench_leaf_detectors);
criterion_main!(benches);
