#![warn(missing_docs)]
//! # Forkbench
//!
//! Micro-benchmark harness that measures every benchmark in its own worker
//! process.
//!
//! - **Process Isolation**: each benchmark runs in a fresh re-execution of
//!   the benchmark binary, so heap and cache state never leak between them
//! - **Adaptive Repeat Count**: the callable is repeated until one sample
//!   comfortably exceeds the clock resolution
//! - **Statistics**: median, mode, standard deviation and a Student's-t
//!   margin of error per benchmark
//! - **Fail-Late Scheduling**: a panicking or crashing benchmark is
//!   reported, and every other benchmark still runs
//!
//! ## Quick Start
//!
//! ```ignore
//! use forkbench::prelude::*;
//!
//! bench_file!(|ctx| {
//!     ctx.group_with("parse", PartialOptions::new().min_samples(20), |ctx| {
//!         ctx.benchmark("small", || "42".parse::<u64>());
//!         ctx.benchmark("large", || "18446744073709551615".parse::<u64>());
//!     });
//! });
//!
//! fn main() {
//!     if let Err(e) = forkbench::run() {
//!         eprintln!("Error: {}", e);
//!         std::process::exit(1);
//!     }
//! }
//! ```
//!
//! ## Async Benchmarks
//!
//! ```ignore
//! bench_file!(|ctx| {
//!     ctx.benchmark_async("yield", || async {
//!         tokio::task::yield_now().await;
//!     });
//! });
//! ```

// Re-export core types
pub use forkbench_core::{
    BenchFile, Benchmark, BenchmarkOptions, BenchmarkResult, DiscoveryContext, DiscoveryError,
    Group, Measurement, Node, PartialOptions, Routine, TimeUnit, Timer, discover_all,
    parse_duration,
};

// Re-export wire types
pub use forkbench_ipc::{ErrorKind, ResultStats, WireError};

// Re-export stats
pub use forkbench_stats::{ConfidenceLevel, FullAnalysis, full_analysis};

// Re-export exporters
pub use forkbench_report::{
    BenchmarkFailure, ConsoleExporter, ExportManager, Exporter, HierarchyExporter, JsonExporter,
};

// Re-export scheduling
pub use forkbench_cli::{
    Discovered, PlanEntry, RunReport, Scheduler, build_plan, discover, is_worker_invocation,
    run_with_cli,
};

/// Internal re-exports for macro use
#[doc(hidden)]
pub mod internal {
    pub use inventory;
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{DiscoveryContext, PartialOptions, TimeUnit, bench_file};
}

/// Register the benchmarks of a file.
///
/// The body receives a [`DiscoveryContext`] and declares groups and
/// benchmarks on it. Without an explicit path the file is registered under
/// `file!()`, so use one invocation per source file or name them apart.
///
/// ```ignore
/// bench_file!(|ctx| {
///     ctx.benchmark("noop", || ());
/// });
///
/// bench_file!("suites/sorting", |ctx| {
///     ctx.benchmark("sort", || vec![3, 1, 2].sort());
/// });
/// ```
#[macro_export]
macro_rules! bench_file {
    ($body:expr) => {
        $crate::bench_file!(::core::file!(), $body);
    };
    ($path:expr, $body:expr $(,)?) => {
        $crate::internal::inventory::submit! {
            $crate::BenchFile::new($path, $body)
        }
    };
}

/// Run the Forkbench CLI harness.
///
/// Call this from your benchmark binary's `main()`:
/// ```ignore
/// fn main() {
///     forkbench::run().unwrap();
/// }
/// ```
pub use forkbench_cli::run;

/// Serve one benchmark as a worker and exit; for custom `main` functions
/// that check [`is_worker_invocation`] themselves.
pub use forkbench_cli::run_worker;
