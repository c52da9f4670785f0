//! # Pair Table Benchmark
//!
//! Measures set/get throughput of the chained pair table for the
//! collision-filter workloads the proxy layer produces.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tandem_core::{PairFlagTable, SlotId};

fn pairs(count: u32) -> Vec<(SlotId, SlotId)> {
    (0..count)
        .map(|i| (SlotId::new(i, 0), SlotId::new(i.wrapping_mul(7) + count, 0)))
        .collect()
}

fn bench_pair_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("pair_table_set");

    for count in [1_000u32, 10_000, 100_000] {
        let keys = pairs(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let mut table = PairFlagTable::with_capacity(keys.len());
                for &(a, z) in &keys {
                    let _ = table.set(a, z, 1u32);
                }
                black_box(table.len())
            });
        });
    }

    group.finish();
}

fn bench_pair_get_reversed(c: &mut Criterion) {
    let keys = pairs(100_000);
    let mut table = PairFlagTable::with_capacity(keys.len());
    for &(a, z) in &keys {
        let _ = table.set(a, z, 1u32);
    }

    c.bench_function("pair_table_get_reversed_100k", |b| {
        b.iter(|| {
            let mut sum = 0u32;
            for &(a, z) in &keys {
                sum += table.get(z, a).unwrap_or(0);
            }
            black_box(sum)
        });
    });
}

criterion_group!(benches, bench_pair_set, bench_pair_get_reversed);
criterion_main!(benches);
