//! Forkbench Example Benchmarks
//!
//! Run with:
//!   cargo run --example benchmarks                    # Run all benchmarks
//!   cargo run --example benchmarks -- list            # Show the discovered tree
//!   cargo run --example benchmarks -- sorting         # Only ids matching "sorting"
//!   cargo run --example benchmarks -- -j 4 -e json    # Four workers, JSON report

use forkbench::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::hint::black_box;
use std::time::Duration;

// ============================================================================
// Collections
// ============================================================================

bench_file!("demos/collections.rs", |ctx| {
    ctx.group("collections", |ctx| {
        ctx.benchmark("vec-sum-1k", || {
            let data: Vec<u64> = (0..1_000).collect();
            data.iter().sum::<u64>()
        });

        ctx.group_with(
            "maps",
            PartialOptions::new().min_samples(20),
            |ctx| {
                ctx.benchmark("hashmap-insert-100", || {
                    let mut map = HashMap::new();
                    for i in 0..100u32 {
                        map.insert(i, i * 2);
                    }
                    map
                });
                ctx.benchmark("btreemap-insert-100", || {
                    let mut map = BTreeMap::new();
                    for i in 0..100u32 {
                        map.insert(i, i * 2);
                    }
                    map
                });
            },
        );
    });
});

// ============================================================================
// Sorting, with per-group setup and teardown
// ============================================================================

bench_file!("demos/sorting.rs", |ctx| {
    ctx.group_with(
        "sorting",
        PartialOptions::new().max_time(TimeUnit::Second.of(2.0)),
        |ctx| {
            ctx.setup(|| eprintln!("sorting: setup"));
            ctx.teardown(|| eprintln!("sorting: teardown"));

            ctx.benchmark("sort-unstable-1k", || {
                let mut data: Vec<u64> = (0..1_000).rev().collect();
                data.sort_unstable();
                data
            });
            ctx.benchmark("sort-stable-1k", || {
                let mut data: Vec<u64> = (0..1_000).rev().collect();
                data.sort();
                data
            });
        },
    );
});

// ============================================================================
// Async
// ============================================================================

bench_file!("demos/async.rs", |ctx| {
    ctx.group("async", |ctx| {
        ctx.benchmark_async("yield-now", || async {
            tokio::task::yield_now().await;
        });
        ctx.benchmark_async_with(
            "sleep-100us",
            PartialOptions::new()
                .min_samples(5)
                .max_samples(20)
                .max_time(TimeUnit::Millisecond.of(500.0)),
            || async {
                tokio::time::sleep(Duration::from_micros(100)).await;
                black_box(1)
            },
        );
    });
});

fn main() {
    // Every file registered above is discovered through the inventory
    if let Err(e) = forkbench::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
