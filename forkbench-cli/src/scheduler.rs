//! Execution Scheduler
//!
//! Runs the plan in positional chunks of `run_parallel` entries. Chunks run
//! strictly one after another; inside a chunk every entry gets its own
//! worker process on a rayon pool. Outcomes are forwarded to the exporter
//! on the calling thread as each worker finishes, and a failure never stops
//! later chunks from running.

use crate::planner::{Discovered, PlanEntry};
use crate::supervisor::{SupervisorError, WorkerHandle, WorkerOutcome, current_binary};
use forkbench_ipc::{BenchmarkOptions, BenchmarkResult, ErrorKind, StartMessage, WireError};
use forkbench_report::{BenchmarkFailure, Exporter};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default slack a worker gets beyond its sampling budget
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Spans of `min_time` allowed for calibration when sizing the watchdog
const CALIBRATION_SPANS: u64 = 8;

/// Upper bound on any watchdog, keeps deadlines representable as `Instant`
const MAX_WATCHDOG: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Everything a run produced
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunReport {
    /// Successful benchmarks in completion order
    pub results: Vec<BenchmarkResult>,
    /// Failed benchmarks and files, in the order they failed
    pub failures: Vec<BenchmarkFailure>,
}

impl RunReport {
    /// Whether nothing failed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// The first failure encountered
    pub fn first_error(&self) -> Option<&BenchmarkFailure> {
        self.failures.first()
    }
}

/// Spawns workers for plan entries, one process per benchmark
#[derive(Debug, Clone)]
pub struct Scheduler {
    binary: PathBuf,
    run_parallel: usize,
    timeout: Duration,
}

impl Scheduler {
    /// Scheduler spawning `binary` as the worker
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            run_parallel: 1,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Scheduler using the running executable as the worker
    pub fn current_exe() -> Result<Self, SupervisorError> {
        Ok(Self::new(current_binary()?))
    }

    /// Chunk size; 0 is treated as 1
    pub fn with_run_parallel(mut self, run_parallel: usize) -> Self {
        self.run_parallel = run_parallel.max(1);
        self
    }

    /// Slack each worker gets beyond its sampling budget
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Chunk size in effect
    pub fn run_parallel(&self) -> usize {
        self.run_parallel
    }

    /// Watchdog for a worker measuring with `options`.
    ///
    /// A worker may spend `max_time` sampling, plus a span of up to twice
    /// `min_time` for every required sample and calibration step, before
    /// the configured timeout starts counting.
    pub fn watchdog(&self, options: &BenchmarkOptions) -> Duration {
        let spans = options.min_samples.saturating_add(CALIBRATION_SPANS);
        let budget = options
            .max_time
            .saturating_add(options.min_time.saturating_mul(2).saturating_mul(spans));
        self.timeout
            .saturating_add(Duration::from_nanos(budget))
            .min(MAX_WATCHDOG)
    }

    /// Run every entry of `plan` and report to `exporter`.
    ///
    /// Emits `on_hierarchy` for the discovered roots, `on_error` for every
    /// file that failed discovery, then `on_result`/`on_error` per entry and
    /// finally `on_finished` with all successful results.
    pub fn run(
        &self,
        discovered: &Discovered,
        plan: &[PlanEntry],
        exporter: &mut dyn Exporter,
    ) -> RunReport {
        exporter.on_hierarchy(&discovered.roots);

        let mut report = RunReport::default();
        for failure in &discovered.failures {
            warn!(file = %failure.filename, "{}", failure.error);
            exporter.on_error(failure);
            report.failures.push(failure.clone());
        }

        info!(
            "Running {} benchmarks, {} worker(s) at a time",
            plan.len(),
            self.run_parallel
        );

        match ThreadPoolBuilder::new().num_threads(self.run_parallel).build() {
            Ok(pool) => {
                for (index, chunk) in plan.chunks(self.run_parallel).enumerate() {
                    debug!(chunk = index, size = chunk.len(), "starting chunk");
                    self.run_chunk(&pool, chunk, exporter, &mut report);
                }
            }
            Err(e) => {
                warn!("Failed to build worker pool, running serially: {}", e);
                for entry in plan {
                    let outcome = self.run_entry(entry);
                    record(entry, outcome, exporter, &mut report);
                }
            }
        }

        exporter.on_finished(&report.results);
        report
    }

    fn run_chunk(
        &self,
        pool: &ThreadPool,
        chunk: &[PlanEntry],
        exporter: &mut dyn Exporter,
        report: &mut RunReport,
    ) {
        let (tx, rx) = mpsc::channel();
        pool.in_place_scope(|scope| {
            for entry in chunk {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let outcome = self.run_entry(entry);
                    let _ = tx.send((entry, outcome));
                });
            }
            drop(tx);

            // Blocks until every worker of the chunk has reported
            for (entry, outcome) in rx {
                record(entry, outcome, exporter, report);
            }
        });
    }

    fn run_entry(&self, entry: &PlanEntry) -> WorkerOutcome {
        let start = StartMessage::new(&entry.id, &entry.filename, entry.options);
        match WorkerHandle::spawn(&self.binary, self.watchdog(&entry.options)) {
            Ok(worker) => worker.run(&start),
            Err(e) => Err(WireError::new(ErrorKind::WorkerCrash, e.to_string())),
        }
    }
}

fn record(
    entry: &PlanEntry,
    outcome: WorkerOutcome,
    exporter: &mut dyn Exporter,
    report: &mut RunReport,
) {
    match outcome {
        Ok(result) => {
            debug!(id = %result.id, samples = result.sample_count, "benchmark finished");
            exporter.on_result(&result);
            report.results.push(result);
        }
        Err(error) => {
            warn!(id = %entry.id, "{}", error);
            let failure = BenchmarkFailure {
                id: entry.id.clone(),
                filename: entry.filename.clone(),
                error,
            };
            exporter.on_error(&failure);
            report.failures.push(failure);
        }
    }
}
