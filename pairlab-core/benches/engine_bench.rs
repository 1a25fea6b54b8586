//! Criterion benchmarks for PairLab hot paths.
//!
//! Benchmarks:
//! 1. k-means clustering (restarts included)
//! 2. Pair selection over a fixed assignment
//! 3. Day loop (full pair simulation with a rule-based policy)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use pairlab_core::domain::{Bar, ClusterId, LatentSet, Pair, TimeSeries};
use pairlab_core::engine::{simulate, SimulationConfig};
use pairlab_core::policies::SpreadReversion;
use pairlab_core::{select_pairs, KMeans};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_latents(n: usize, dim: usize) -> LatentSet {
    LatentSet::from_pairs((0..n).map(|i| {
        let values = (0..dim)
            .map(|j| ((i * 31 + j * 17) as f64 * 0.37).sin() * 3.0 + (i % 8) as f64)
            .collect();
        (format!("S{i:04}"), values)
    }))
    .unwrap()
}

fn make_series(id: &str, n: usize, phase: f64) -> TimeSeries {
    let base_date = chrono::NaiveDate::from_ymd_opt(2015, 1, 2).unwrap();
    let bars = (0..n)
        .map(|i| {
            let close = 100.0 + ((i as f64 * 0.05) + phase).sin() * 10.0;
            Bar::from_close(base_date + chrono::Duration::days(i as i64), close)
        })
        .collect();
    TimeSeries::new(id.into(), bars).unwrap()
}

// ── 1. Clustering ────────────────────────────────────────────────────

fn bench_clustering(c: &mut Criterion) {
    let mut group = c.benchmark_group("kmeans");
    for &n in &[100usize, 500] {
        let set = make_latents(n, 10);
        group.bench_with_input(BenchmarkId::from_parameter(n), &set, |b, set| {
            b.iter(|| KMeans::new(10, 42).fit(black_box(set)).unwrap());
        });
    }
    group.finish();
}

// ── 2. Selection ─────────────────────────────────────────────────────

fn bench_selection(c: &mut Criterion) {
    let set = make_latents(500, 10);
    let assignment = KMeans::new(10, 42).fit(&set).unwrap().assignment;
    c.bench_function("select_pairs_500", |b| {
        b.iter(|| select_pairs(black_box(&set), black_box(&assignment), 15).unwrap());
    });
}

// ── 3. Simulation ────────────────────────────────────────────────────

fn bench_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulate");
    let pair = Pair::new("A".into(), "B".into(), ClusterId(0), 0.0).unwrap();
    let policy = SpreadReversion::default();
    let config = SimulationConfig::default();
    for &n in &[252usize, 2520] {
        let a = make_series("A", n, 0.0);
        let b = make_series("B", n, 0.7);
        group.bench_with_input(BenchmarkId::from_parameter(n), &(a, b), |bench, (a, b)| {
            bench.iter(|| simulate(&pair, black_box(a), black_box(b), &policy, &config, None).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_clustering, bench_selection, bench_simulation);
criterion_main!(benches);
