//! Benchmark for PersistentTreeSet vs standard BTreeSet.
//!
//! Compares verset's PersistentTreeSet against Rust's standard BTreeSet for
//! common operations, plus the persistent-only workflows (O(1) versioned
//! copies, cursor walks) that BTreeSet has no direct analogue for.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::collections::BTreeSet;
use verset::PersistentTreeSet;

/// Deterministic insertion order that keeps the unbalanced tree shallow.
///
/// Multiplying by an odd constant permutes the u32 space, so the values
/// are distinct and arrive in a scrambled order.
fn scrambled_values(size: u32) -> Vec<i32> {
    (0..size)
        .map(|index| index.wrapping_mul(2_654_435_761) as i32)
        .collect()
}

// =============================================================================
// insert Benchmark
// =============================================================================

fn benchmark_insert(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("insert");

    for size in [100u32, 1000, 10000] {
        let values = scrambled_values(size);

        // PersistentTreeSet insert
        group.bench_with_input(
            BenchmarkId::new("PersistentTreeSet", size),
            &size,
            |bencher, _| {
                bencher.iter(|| {
                    let mut set: PersistentTreeSet<i32> = PersistentTreeSet::new();
                    for value in &values {
                        set.insert(black_box(*value));
                    }
                    black_box(set.len())
                });
            },
        );

        // Standard BTreeSet insert
        group.bench_with_input(BenchmarkId::new("BTreeSet", size), &size, |bencher, _| {
            bencher.iter(|| {
                let mut set = BTreeSet::new();
                for value in &values {
                    set.insert(black_box(*value));
                }
                black_box(set.len())
            });
        });
    }

    group.finish();
}

// =============================================================================
// contains Benchmark
// =============================================================================

fn benchmark_contains(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("contains");

    for size in [100u32, 1000, 10000] {
        // Prepare data
        let values = scrambled_values(size);
        let persistent_set: PersistentTreeSet<i32> = values.iter().copied().collect();
        let standard_set: BTreeSet<i32> = values.iter().copied().collect();

        // PersistentTreeSet contains
        group.bench_with_input(
            BenchmarkId::new("PersistentTreeSet", size),
            &size,
            |bencher, _| {
                bencher.iter(|| {
                    let mut hits = 0usize;
                    for value in &values {
                        if persistent_set.contains(black_box(value)) {
                            hits += 1;
                        }
                    }
                    black_box(hits)
                });
            },
        );

        // Standard BTreeSet contains
        group.bench_with_input(BenchmarkId::new("BTreeSet", size), &size, |bencher, _| {
            bencher.iter(|| {
                let mut hits = 0usize;
                for value in &values {
                    if standard_set.contains(black_box(value)) {
                        hits += 1;
                    }
                }
                black_box(hits)
            });
        });
    }

    group.finish();
}

// =============================================================================
// copy-and-diverge Benchmark
// =============================================================================

fn benchmark_copy_and_diverge(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("copy_and_diverge");

    for size in [100u32, 1000, 10000] {
        // Prepare data
        let persistent_set: PersistentTreeSet<i32> =
            scrambled_values(size).into_iter().collect();
        let standard_set: BTreeSet<i32> = scrambled_values(size).into_iter().collect();

        // PersistentTreeSet: O(1) copy plus one path-copying insert
        group.bench_with_input(
            BenchmarkId::new("PersistentTreeSet", size),
            &size,
            |bencher, _| {
                bencher.iter(|| {
                    let mut branch = persistent_set.clone();
                    branch.insert(black_box(-1));
                    black_box(branch.len())
                });
            },
        );

        // Standard BTreeSet: full copy plus one insert
        group.bench_with_input(BenchmarkId::new("BTreeSet", size), &size, |bencher, _| {
            bencher.iter(|| {
                let mut branch = standard_set.clone();
                branch.insert(black_box(-1));
                black_box(branch.len())
            });
        });
    }

    group.finish();
}

// =============================================================================
// iteration Benchmark
// =============================================================================

fn benchmark_iteration(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("iteration");

    for size in [100u32, 1000, 10000] {
        // Prepare data
        let persistent_set: PersistentTreeSet<i32> =
            scrambled_values(size).into_iter().collect();
        let standard_set: BTreeSet<i32> = scrambled_values(size).into_iter().collect();

        // PersistentTreeSet iteration
        group.bench_with_input(
            BenchmarkId::new("PersistentTreeSet", size),
            &size,
            |bencher, _| {
                bencher.iter(|| {
                    let sum: i64 = persistent_set.iter().map(i64::from).sum();
                    black_box(sum)
                });
            },
        );

        // Standard BTreeSet iteration
        group.bench_with_input(BenchmarkId::new("BTreeSet", size), &size, |bencher, _| {
            bencher.iter(|| {
                let sum: i64 = standard_set.iter().copied().map(i64::from).sum();
                black_box(sum)
            });
        });
    }

    group.finish();
}

// =============================================================================
// cursor walk Benchmark
// =============================================================================

fn benchmark_cursor_walk(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("cursor_walk");

    for size in [100u32, 1000, 10000] {
        let persistent_set: PersistentTreeSet<i32> =
            scrambled_values(size).into_iter().collect();

        // Cursor stepping re-descends from the pinned root on every move
        group.bench_with_input(BenchmarkId::new("Cursor", size), &size, |bencher, _| {
            bencher.iter(|| {
                let mut sum = 0i64;
                let mut cursor = persistent_set.cursor_front();
                while let Some(value) = cursor.value() {
                    sum += i64::from(value);
                    cursor.move_next();
                }
                black_box(sum)
            });
        });

        // The eager iterator snapshots the values once up front
        group.bench_with_input(BenchmarkId::new("Iterator", size), &size, |bencher, _| {
            bencher.iter(|| {
                let sum: i64 = persistent_set.iter().map(i64::from).sum();
                black_box(sum)
            });
        });
    }

    group.finish();
}

// =============================================================================
// remove Benchmark
// =============================================================================

fn benchmark_remove(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("remove");

    for size in [100u32, 1000, 10000] {
        // Prepare data
        let values = scrambled_values(size);
        let half: Vec<i32> = values.iter().copied().step_by(2).collect();
        let persistent_set: PersistentTreeSet<i32> = values.iter().copied().collect();
        let standard_set: BTreeSet<i32> = values.iter().copied().collect();

        // PersistentTreeSet: branch a version and drain half of it
        group.bench_with_input(
            BenchmarkId::new("PersistentTreeSet", size),
            &size,
            |bencher, _| {
                bencher.iter(|| {
                    let mut working = persistent_set.clone();
                    for value in &half {
                        working.remove(black_box(value));
                    }
                    black_box(working.len())
                });
            },
        );

        // Standard BTreeSet: copy and drain half
        group.bench_with_input(BenchmarkId::new("BTreeSet", size), &size, |bencher, _| {
            bencher.iter(|| {
                let mut working = standard_set.clone();
                for value in &half {
                    working.remove(black_box(value));
                }
                black_box(working.len())
            });
        });
    }

    group.finish();
}

// =============================================================================
// Criterion Group and Main
// =============================================================================

criterion_group!(
    benches,
    benchmark_insert,
    benchmark_contains,
    benchmark_copy_and_diverge,
    benchmark_iteration,
    benchmark_cursor_walk,
    benchmark_remove
);

criterion_main!(benches);
