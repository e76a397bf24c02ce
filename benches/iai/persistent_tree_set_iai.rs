//! IAI-Callgrind benchmark for PersistentTreeSet core operations.
//!
//! Measures instruction counts for scrambled construction, version
//! branching, cursor walks, and drains. Data sizes: 100/1000/10000.

use iai_callgrind::{library_benchmark, library_benchmark_group, main};
use std::hint::black_box;
use verset::PersistentTreeSet;

/// Distinct values in a scrambled order, so the unbalanced tree stays
/// shallow.
fn scrambled(size: u32) -> Vec<i32> {
    (0..size)
        .map(|index| index.wrapping_mul(2_654_435_761) as i32)
        .collect()
}

// Setup functions for different data sizes
fn setup_scrambled_vec_100() -> Vec<i32> {
    scrambled(100)
}

fn setup_scrambled_vec_1000() -> Vec<i32> {
    scrambled(1000)
}

fn setup_scrambled_vec_10000() -> Vec<i32> {
    scrambled(10000)
}

fn setup_set_100() -> PersistentTreeSet<i32> {
    scrambled(100).into_iter().collect()
}

fn setup_set_1000() -> PersistentTreeSet<i32> {
    scrambled(1000).into_iter().collect()
}

fn setup_set_10000() -> PersistentTreeSet<i32> {
    scrambled(10000).into_iter().collect()
}

// Construction benchmarks
#[library_benchmark]
#[bench::with_setup(setup_scrambled_vec_100())]
fn collect_100(elements: Vec<i32>) -> PersistentTreeSet<i32> {
    black_box(black_box(elements).into_iter().collect())
}

#[library_benchmark]
#[bench::with_setup(setup_scrambled_vec_1000())]
fn collect_1000(elements: Vec<i32>) -> PersistentTreeSet<i32> {
    black_box(black_box(elements).into_iter().collect())
}

#[library_benchmark]
#[bench::with_setup(setup_scrambled_vec_10000())]
fn collect_10000(elements: Vec<i32>) -> PersistentTreeSet<i32> {
    black_box(black_box(elements).into_iter().collect())
}

// Version branching benchmarks: O(1) copy plus one path-copying insert
#[library_benchmark]
#[bench::with_setup(setup_set_100())]
fn branch_and_insert_100(set: PersistentTreeSet<i32>) -> usize {
    let mut branch = set.clone();
    branch.insert(black_box(-1));
    black_box(branch.len())
}

#[library_benchmark]
#[bench::with_setup(setup_set_1000())]
fn branch_and_insert_1000(set: PersistentTreeSet<i32>) -> usize {
    let mut branch = set.clone();
    branch.insert(black_box(-1));
    black_box(branch.len())
}

#[library_benchmark]
#[bench::with_setup(setup_set_10000())]
fn branch_and_insert_10000(set: PersistentTreeSet<i32>) -> usize {
    let mut branch = set.clone();
    branch.insert(black_box(-1));
    black_box(branch.len())
}

// Cursor walk benchmarks: one O(h) re-descent per step
#[library_benchmark]
#[bench::with_setup(setup_set_100())]
fn cursor_walk_100(set: PersistentTreeSet<i32>) -> i64 {
    let mut sum = 0i64;
    let mut cursor = set.cursor_front();
    while let Some(value) = cursor.value() {
        sum += i64::from(value);
        cursor.move_next();
    }
    black_box(sum)
}

#[library_benchmark]
#[bench::with_setup(setup_set_1000())]
fn cursor_walk_1000(set: PersistentTreeSet<i32>) -> i64 {
    let mut sum = 0i64;
    let mut cursor = set.cursor_front();
    while let Some(value) = cursor.value() {
        sum += i64::from(value);
        cursor.move_next();
    }
    black_box(sum)
}

// Drain benchmarks: remove every element in insertion order
#[library_benchmark]
#[bench::with_setup(setup_set_100())]
fn drain_100(set: PersistentTreeSet<i32>) -> usize {
    let mut set = set;
    for value in scrambled(100) {
        set.remove(black_box(&value));
    }
    black_box(set.allocated_nodes())
}

#[library_benchmark]
#[bench::with_setup(setup_set_1000())]
fn drain_1000(set: PersistentTreeSet<i32>) -> usize {
    let mut set = set;
    for value in scrambled(1000) {
        set.remove(black_box(&value));
    }
    black_box(set.allocated_nodes())
}

library_benchmark_group!(
    name = persistent_tree_set_group;
    benchmarks =
        collect_100, collect_1000, collect_10000,
        branch_and_insert_100, branch_and_insert_1000, branch_and_insert_10000,
        cursor_walk_100, cursor_walk_1000,
        drain_100, drain_1000
);

main!(library_benchmark_groups = persistent_tree_set_group);
