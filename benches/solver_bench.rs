// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use aniso_fmm::confidence::{ConfidenceTracker, MagnitudeNorm};
use aniso_fmm::connectivity::ConnectivityMapper;
use aniso_fmm::core::Grid3;
use aniso_fmm::marcher::{DynamicsField, Marcher};
use aniso_fmm::metric::TensorMetric;
use aniso_fmm::queue::PairingHeap;
use nalgebra::{Matrix3, Vector3};

fn make_metric(n: usize, b: Matrix3<f64>) -> TensorMetric {
    let grid = Grid3::with_unit_spacing([n, n, n]).unwrap();
    TensorMetric::uniform(grid, b).unwrap()
}

fn anisotropic_tensor() -> Matrix3<f64> {
    let r = std::f64::consts::FRAC_1_SQRT_2;
    let rot = Matrix3::new(r, -r, 0.0, r, r, 0.0, 0.0, 0.0, 1.0);
    rot * Matrix3::from_diagonal(&Vector3::new(4.0, 1.0, 1.0)) * rot.transpose()
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Single seed, isotropic, engine only.
fn bench_isotropic(c: &mut Criterion) {
    let mut group = c.benchmark_group("isotropic_single_seed");
    for &n in &[32usize, 64] {
        let metric = make_metric(n, Matrix3::identity());
        group.bench_function(format!("{}^3", n), |b| {
            b.iter_with_setup(
                || {
                    let mut m = Marcher::new(metric.grid().clone(), &metric, ());
                    m.set_value([n / 2; 3], 0.0).unwrap();
                    m.add_trial_point([n / 2; 3]).unwrap();
                    m
                },
                |mut m| {
                    m.run();
                    black_box(m)
                },
            );
        });
    }
    group.finish();
}

/// Single seed, rotated tensor, with dynamics and confidence observers.
fn bench_anisotropic_with_observers(c: &mut Criterion) {
    let n = 48;
    let metric = make_metric(n, anisotropic_tensor());
    let norm = MagnitudeNorm::Euclidean;
    c.bench_function("anisotropic_48^3_observers", |b| {
        b.iter_with_setup(
            || {
                let grid = metric.grid();
                let observers = (
                    DynamicsField::new(grid.num_nodes()),
                    ConfidenceTracker::new(grid, &norm).unwrap(),
                );
                let mut m = Marcher::new(grid.clone(), &metric, observers);
                m.set_value([n / 2; 3], 0.0).unwrap();
                m.add_trial_point([n / 2; 3]).unwrap();
                m
            },
            |mut m| {
                m.run();
                black_box(m)
            },
        );
    });
}

/// Region sweep: one march per seed, spread over the worker pool.
fn bench_region_sweep(c: &mut Criterion) {
    let n = 24;
    let cpus = num_cpus();
    let metric = make_metric(n, anisotropic_tensor());
    let grid = metric.grid().clone();
    let mut roi = vec![0.0; grid.num_nodes()];
    for x in 10..12 {
        for y in 10..12 {
            for z in 10..12 {
                roi[grid.offset([x, y, z])] = 1.0;
            }
        }
    }

    let mut group = c.benchmark_group("region_sweep_24^3_8seeds");
    group.sample_size(10);
    let mut thread_counts = vec![1];
    if cpus > 1 {
        thread_counts.push(cpus);
    }
    for threads in thread_counts {
        let mapper = ConnectivityMapper::new(metric.clone(), MagnitudeNorm::Euclidean)
            .unwrap()
            .with_threads(threads);
        group.bench_function(format!("{}threads", threads), |b| {
            b.iter(|| black_box(mapper.map_region(&roi).unwrap()));
        });
    }
    group.finish();
}

/// Queue churn: push, decrease-key and pop in the pattern of a marching front.
fn bench_queue(c: &mut Criterion) {
    c.bench_function("pairing_heap_100k", |b| {
        b.iter(|| {
            let mut heap = PairingHeap::with_capacity(100_000);
            let mut handles = Vec::with_capacity(100_000);
            for i in 0..100_000u64 {
                let key = ((i * 2_654_435_761) % 1_000_003) as f64;
                handles.push(heap.push(key, i));
            }
            for (i, h) in handles.iter().enumerate().step_by(3) {
                let key = heap.key(*h) - (i % 97) as f64;
                heap.decrease_key(*h, key);
            }
            let mut sum = 0.0;
            while let Some((k, _)) = heap.pop() {
                sum += k;
            }
            black_box(sum)
        });
    });
}

criterion_group!(
    benches,
    bench_isotropic,
    bench_anisotropic_with_observers,
    bench_region_sweep,
    bench_queue
);
criterion_main!(benches);
