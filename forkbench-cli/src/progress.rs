//! Progress bar on stderr, hidden when stderr is not a terminal.

use forkbench_ipc::BenchmarkResult;
use forkbench_report::{BenchmarkFailure, Exporter};
use indicatif::{ProgressBar, ProgressStyle};

/// Advances a bar per finished benchmark
pub struct ProgressExporter {
    bar: ProgressBar,
    failed: u64,
}

impl ProgressExporter {
    /// Bar sized for `total` benchmarks
    pub fn new(total: usize) -> Self {
        Self::with_bar(ProgressBar::new(total as u64))
    }

    /// Bar that never draws, for tests and quiet runs
    pub fn hidden(total: usize) -> Self {
        let exporter = Self::with_bar(ProgressBar::hidden());
        exporter.bar.set_length(total as u64);
        exporter
    }

    fn with_bar(bar: ProgressBar) -> Self {
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar, failed: 0 }
    }

    /// Benchmarks accounted for so far
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Benchmarks that failed so far
    pub fn failed(&self) -> u64 {
        self.failed
    }
}

impl Exporter for ProgressExporter {
    fn on_result(&mut self, result: &BenchmarkResult) {
        self.bar.set_message(result.id.clone());
        self.bar.inc(1);
    }

    fn on_error(&mut self, failure: &BenchmarkFailure) {
        self.failed += 1;
        self.bar.set_message(format!("{} failed", failure.id));
        self.bar.inc(1);
    }

    fn on_finished(&mut self, _results: &[BenchmarkResult]) {
        if self.failed == 0 {
            self.bar.finish_with_message("Complete");
        } else {
            self.bar
                .finish_with_message(format!("Complete ({} failed)", self.failed));
        }
    }
}
