// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array3;

use eikonal_sweep::batch::ShotBatch;
use eikonal_sweep::source::FAR_FIELD;
use eikonal_sweep::{backward, forward};

fn center_seed(n: usize) -> Array3<f64> {
    let mut u0 = Array3::from_elem((n, n, n), FAR_FIELD);
    u0[[n / 2, n / 2, n / 2]] = 0.0;
    u0
}

fn layered_slowness(n: usize) -> Array3<f64> {
    Array3::from_shape_fn((n, n, n), |(_, _, k)| 1.0 / (1.0 + 0.02 * k as f64))
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Forward solve: grid size scaling, center source, layered medium.
fn bench_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward");
    for &n in &[16, 32, 64] {
        let u0 = center_seed(n);
        let f = layered_slowness(n);
        group.bench_function(format!("{}^3", n), |b| {
            b.iter(|| black_box(forward(&u0, &f, 1.0).unwrap()));
        });
    }
    group.finish();
}

/// Backward pass: linearization, assembly and sparse LU.
fn bench_backward(c: &mut Criterion) {
    let mut group = c.benchmark_group("backward");
    for &n in &[8, 16, 24] {
        let u0 = center_seed(n);
        let f = layered_slowness(n);
        let u = forward(&u0, &f, 1.0).unwrap();
        let grad_u = Array3::from_elem((n, n, n), 1.0);
        group.bench_function(format!("{}^3", n), |b| {
            b.iter(|| black_box(backward(&grad_u, &u, &u0, &f, 1.0).unwrap()));
        });
    }
    group.finish();
}

/// Shot batch: 8 shots on 32^3, 1 thread and all-cores.
fn bench_shot_batch(c: &mut Criterion) {
    let n = 32;
    let f = layered_slowness(n);
    let u0s: Vec<Array3<f64>> = (0..8)
        .map(|s| {
            let mut u0 = Array3::from_elem((n, n, n), FAR_FIELD);
            u0[[(s * 4) % n, n / 2, 0]] = 0.0;
            u0
        })
        .collect();

    let cpus = num_cpus();
    let mut group = c.benchmark_group("shot_batch_8x32^3");
    for threads in [1, cpus] {
        let batch = ShotBatch::default().with_threads(threads);
        group.bench_function(format!("{}threads", threads), |b| {
            b.iter(|| black_box(batch.forward(&u0s, &f, 1.0).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_forward, bench_backward, bench_shot_batch);
criterion_main!(benches);
