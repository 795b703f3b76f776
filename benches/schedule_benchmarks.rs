//! Benchmarks for schedule queries and copy-on-write mutation.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use polysched::prelude::*;

/// `n` statements over 8 coordinates, alternating between a deep band
/// structure and a single band.
fn wide_schedule(n: usize) -> Schedule {
    let mut builder = ScheduleBuilder::new(ParameterSpace::new(["N"]));
    for i in 0..n {
        let map = AffineMap::identity(8, 1);
        if i % 2 == 0 {
            builder.append_node(map, &[2, 4, 6, 8], &[BandId(0), BandId(1), BandId(2), BandId(3)]).unwrap();
        } else {
            builder.append_node(map, &[8], &[BandId(0)]).unwrap();
        }
    }
    builder.seal().unwrap()
}

/// Benchmark depth queries across many statements.
fn bench_depth_queries(c: &mut Criterion) {
    let schedule = wide_schedule(1000);

    c.bench_function("bands_at_depth_1000", |b| {
        b.iter(|| schedule.bands_at_depth(black_box(2)).unwrap())
    });

    c.bench_function("common_depths_1000", |b| {
        b.iter(|| schedule.common_depths().unwrap())
    });
}

/// Benchmark full invariant validation.
fn bench_validate(c: &mut Criterion) {
    let schedule = wide_schedule(1000);

    c.bench_function("validate_1000", |b| {
        b.iter(|| schedule.validate().unwrap())
    });
}

/// Benchmark split + merge on shared and unshared storage.
fn bench_mutation(c: &mut Criterion) {
    let schedule = wide_schedule(1000);

    c.bench_function("split_merge_shared", |b| {
        b.iter(|| {
            let mut copy = schedule.retain().unwrap();
            copy.split_band(black_box(1), 0, 4).unwrap();
            copy.merge_bands(1, 0, 1).unwrap();
            copy
        })
    });

    let mut owned = wide_schedule(1000);
    c.bench_function("split_merge_owned", |b| {
        b.iter(|| {
            owned.split_band(black_box(1), 0, 4).unwrap();
            owned.merge_bands(1, 0, 1).unwrap();
        })
    });
}

criterion_group!(benches, bench_depth_queries, bench_validate, bench_mutation);
criterion_main!(benches);
