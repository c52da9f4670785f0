//! # Indexed Registry Benchmark
//!
//! Measures the intrusive registry against the linear-scan baseline it
//! replaces:
//! 1. Push/remove churn on a slot arena
//! 2. Membership tests
//!
//! Target: removal cost independent of registry size.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tandem_core::{IndexOf, IndexedRegistry, SlotArena, SlotId, NO_INDEX};

struct Record {
    index: u32,
}

struct Tracked;

impl IndexOf<Record> for Tracked {
    fn get(item: &Record) -> u32 {
        item.index
    }
    fn set(item: &mut Record, index: u32) {
        item.index = index;
    }
}

/// Generate deterministic "random" positions
fn generate_random_indices(count: usize, max: usize, seed: u64) -> Vec<usize> {
    let mut indices = Vec::with_capacity(count);
    let mut state = seed;

    for _ in 0..count {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        indices.push((state as usize) % max);
    }

    indices
}

fn populated(count: usize) -> (SlotArena<Record>, IndexedRegistry<SlotId, Tracked>, Vec<SlotId>) {
    let mut arena = SlotArena::with_capacity(count);
    let mut registry = IndexedRegistry::with_capacity(count);
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        let id = arena.insert(Record { index: NO_INDEX });
        let _ = registry.push_back(&mut arena, id);
        ids.push(id);
    }
    (arena, registry, ids)
}

// =============================================================================
// REMOVE + REINSERT CHURN
// =============================================================================

fn bench_registry_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_churn");

    for count in [1_000, 10_000, 100_000] {
        let (mut arena, mut registry, ids) = populated(count);
        let order = generate_random_indices(1_000, count, 0xDEAD_BEEF);

        group.bench_with_input(BenchmarkId::new("indexed", count), &count, |b, _| {
            b.iter(|| {
                for &i in &order {
                    let id = ids[i];
                    let _ = registry.remove(&mut arena, id);
                    let _ = registry.push_back(&mut arena, id);
                }
                black_box(registry.len())
            });
        });

        let mut linear: Vec<SlotId> = ids.clone();
        group.bench_with_input(BenchmarkId::new("linear_scan", count), &count, |b, _| {
            b.iter(|| {
                for &i in &order {
                    let id = ids[i];
                    if let Some(pos) = linear.iter().position(|&k| k == id) {
                        linear.swap_remove(pos);
                    }
                    linear.push(id);
                }
                black_box(linear.len())
            });
        });
    }

    group.finish();
}

// =============================================================================
// MEMBERSHIP
// =============================================================================

fn bench_registry_contains(c: &mut Criterion) {
    let (arena, registry, ids) = populated(100_000);
    let order = generate_random_indices(10_000, ids.len(), 0x1234_5678);

    c.bench_function("registry_contains_100k", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for &i in &order {
                if registry.contains(&arena, ids[i]) {
                    hits += 1;
                }
            }
            black_box(hits)
        });
    });
}

criterion_group!(benches, bench_registry_churn, bench_registry_contains);
criterion_main!(benches);
