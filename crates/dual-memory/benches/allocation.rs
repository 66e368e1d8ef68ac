// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for dual array allocation, release and synchronisation.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use dual_memory::{AllocationTracker, DualMemoryManager, SimulatedAccelerator};
use std::hint::black_box;

fn bench_tracker_register(c: &mut Criterion) {
    let labels: Vec<String> = (0..256).map(|i| format!("buf{i}")).collect();

    c.bench_function("tracker_register_unregister_256", |b| {
        b.iter(|| {
            let mut tracker = AllocationTracker::new();
            for label in &labels {
                tracker.register(label, 64, false);
            }
            for label in &labels {
                tracker.unregister(label);
            }
            black_box(tracker.snapshot())
        })
    });
}

fn bench_allocate_free(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_free");
    for count in [16usize, 1024, 64 * 1024] {
        group.bench_with_input(BenchmarkId::new("host", count), &count, |b, &count| {
            let mut manager = DualMemoryManager::new();
            b.iter(|| {
                let mut a = manager.allocate::<f32>("a", count, false);
                manager.free(&mut a);
            })
        });
        group.bench_with_input(BenchmarkId::new("simulated", count), &count, |b, &count| {
            let mut manager =
                DualMemoryManager::with_accelerator(Box::new(SimulatedAccelerator::new()));
            b.iter(|| {
                let mut a = manager.allocate::<f32>("a", count, true);
                manager.free(&mut a);
            })
        });
    }
    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let mut manager = DualMemoryManager::with_accelerator(Box::new(SimulatedAccelerator::new()));
    let mut a = manager.allocate::<f64>("a", 64 * 1024, true);

    c.bench_function("round_trip_64k_f64", |b| {
        b.iter(|| {
            manager.copy_host_to_device(&a, 0, a.len());
            manager.copy_device_to_host(&mut a, 0, 64 * 1024);
        })
    });

    manager.free(&mut a);
}

criterion_group!(benches, bench_tracker_register, bench_allocate_free, bench_round_trip);
criterion_main!(benches);
