//! Benchmarks for the core pipeline stages
//!
//! Compares the cost of:
//! - Pairwise dissimilarity matrices across metrics
//! - NMDS with multi-restart stress minimization
//! - Penalized smooth fits and derivative bands

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ecostrat_core::derivative::{derivative_band, DerivativeConfig};
use ecostrat_core::dissimilarity::{pairwise, Dissimilarity};
use ecostrat_core::gam::{fit_smooth, GamConfig};
use ecostrat_core::matrix::EcoMatrix;
use ecostrat_core::nmds::{nmds, NmdsConfig};

/// Generate a deterministic synthetic assemblage with a compositional drift
fn drifting_counts(n: usize, p: usize) -> EcoMatrix {
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            (0..p)
                .map(|j| {
                    let drift = i as f64 / n as f64;
                    let peak = j as f64 / p as f64;
                    let abundance = 50.0 * (-(drift - peak).powi(2) / 0.05).exp();
                    abundance + ((i * 7 + j * 13) % 5) as f64
                })
                .collect()
        })
        .collect();
    EcoMatrix::from_rows(&rows).unwrap()
}

fn bench_pairwise(c: &mut Criterion) {
    let mut group = c.benchmark_group("pairwise");
    for &n in &[25usize, 50, 100] {
        let data = drifting_counts(n, 30);
        for metric in [
            Dissimilarity::Euclidean,
            Dissimilarity::BrayCurtis,
            Dissimilarity::ChiSquare,
        ] {
            group.bench_with_input(
                BenchmarkId::new(format!("{metric:?}"), n),
                &data,
                |b, data| b.iter(|| pairwise(black_box(data), metric)),
            );
        }
    }
    group.finish();
}

fn bench_nmds(c: &mut Criterion) {
    let mut group = c.benchmark_group("nmds");
    group.sample_size(10);
    for &n in &[20usize, 40] {
        let data = drifting_counts(n, 30);
        let dissim = pairwise(&data, Dissimilarity::BrayCurtis);
        let config = NmdsConfig {
            n_restarts: 5,
            ..NmdsConfig::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(n), &dissim, |b, dissim| {
            b.iter(|| nmds(black_box(dissim), &config).unwrap())
        });
    }
    group.finish();
}

fn bench_smooth_and_band(c: &mut Criterion) {
    let time: Vec<f64> = (0..100).map(|i| i as f64 * 10.0).collect();
    let y: Vec<f64> = time.iter().map(|&t| (t / 300.0).tanh()).collect();

    c.bench_function("fit_smooth_gcv", |b| {
        b.iter(|| fit_smooth(black_box(&time), black_box(&y), &GamConfig::default()).unwrap())
    });

    let fit = fit_smooth(&time, &y, &GamConfig::default()).unwrap();
    let band_config = DerivativeConfig {
        n_sim: 2000,
        ..DerivativeConfig::default()
    };
    c.bench_function("derivative_band", |b| {
        b.iter(|| derivative_band(black_box(&fit), &band_config).unwrap())
    });
}

criterion_group!(benches, bench_pairwise, bench_nmds, bench_smooth_and_band);
criterion_main!(benches);
