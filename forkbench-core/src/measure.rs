//! Measurement Engine
//!
//! Two phases per benchmark:
//! - Calibration finds the smallest repeat count whose timed span reaches
//!   the minimum observation time
//! - Sampling times that repeat count over and over, normalizing each span
//!   to a per-invocation cost
//!
//! Async routines follow the same control flow but await every invocation
//! before starting the next one.

use crate::timer::Timer;
use crate::tree::{Benchmark, LocalBoxFuture, Routine};
use forkbench_ipc::{BenchmarkOptions, BenchmarkResult, ResultStats};
use forkbench_stats::{
    ConfidenceLevel, FullAnalysis, RESOLUTION_UNCERTAINTY, full_analysis, reduce_uncertainty,
};
use thiserror::Error;
use tracing::debug;

/// Failures of the engine itself (a panicking routine unwinds instead)
#[derive(Debug, Error)]
pub enum MeasureError {
    /// The tokio runtime for an async routine could not be built
    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Calibration and sampling for one set of options
#[derive(Debug, Clone)]
pub struct Measurement {
    options: BenchmarkOptions,
    min_time: f64,
    confidence: ConfidenceLevel,
}

impl Measurement {
    /// `resolution` is the clock resolution in nanoseconds
    pub fn new(options: BenchmarkOptions, resolution: f64) -> Self {
        let floor = reduce_uncertainty(resolution, RESOLUTION_UNCERTAINTY);
        Self {
            options,
            min_time: (options.min_time as f64).max(floor),
            confidence: ConfidenceLevel::default(),
        }
    }

    /// Override the confidence level of the margin of error
    pub fn with_confidence(mut self, confidence: ConfidenceLevel) -> Self {
        self.confidence = confidence;
        self
    }

    /// Effective minimum span in nanoseconds
    pub fn min_time(&self) -> f64 {
        self.min_time
    }

    fn start_count(&self) -> u64 {
        self.options.min_iterations.max(1)
    }

    /// Largest allowed repeat count; never below the starting count
    fn count_cap(&self) -> u64 {
        self.options
            .iteration_limit()
            .map_or(u64::MAX, |limit| limit.max(self.start_count()))
    }

    /// Next repeat count to try, or `None` once `time` covers the minimum
    fn next_count(&self, count: u64, time: f64) -> Option<u64> {
        if time > self.min_time {
            return None;
        }
        let extra = if time <= 0.0 {
            count.saturating_mul(100)
        } else {
            let period = time / count as f64;
            ((self.min_time - time) / period).ceil() as u64
        };
        Some(count.saturating_add(extra.max(1)))
    }

    /// Calibrate the repeat count. `execute(n)` runs the routine `n` times
    /// and returns the elapsed nanoseconds.
    pub fn max_cycles(&self, mut execute: impl FnMut(u64) -> f64) -> u64 {
        let cap = self.count_cap();
        let mut count = self.start_count();
        while count <= cap {
            let time = execute(count);
            match self.next_count(count, time) {
                Some(next) => count = next,
                None => break,
            }
        }
        count.min(cap)
    }

    /// Collect per-invocation samples at a fixed repeat count
    pub fn samples(&self, count: u64, mut execute: impl FnMut(u64) -> f64) -> Vec<f64> {
        let mut collector = SampleCollector::new(&self.options, count);
        while collector.wants_more() {
            collector.push(execute(count));
        }
        collector.finish()
    }

    /// Async [`max_cycles`](Self::max_cycles)
    pub async fn max_cycles_async(
        &self,
        routine: &mut Box<dyn FnMut() -> LocalBoxFuture>,
    ) -> u64 {
        let cap = self.count_cap();
        let mut count = self.start_count();
        while count <= cap {
            let time = time_async(routine, count).await;
            match self.next_count(count, time) {
                Some(next) => count = next,
                None => break,
            }
        }
        count.min(cap)
    }

    /// Async [`samples`](Self::samples)
    pub async fn samples_async(
        &self,
        count: u64,
        routine: &mut Box<dyn FnMut() -> LocalBoxFuture>,
    ) -> Vec<f64> {
        let mut collector = SampleCollector::new(&self.options, count);
        while collector.wants_more() {
            collector.push(time_async(routine, count).await);
        }
        collector.finish()
    }

    /// Measure `bench` with this engine's options and attach the result.
    ///
    /// Setups run before calibration and teardowns after sampling. A panic
    /// in the routine propagates to the caller.
    pub fn run(&self, bench: &mut Benchmark) -> Result<BenchmarkResult, MeasureError> {
        bench.run_setups();
        let (count, times) = match &mut bench.routine {
            Routine::Sync(routine) => {
                let count = self.max_cycles(|n| time_sync(routine, n));
                (count, self.samples(count, |n| time_sync(routine, n)))
            }
            Routine::Async(routine) => {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                runtime.block_on(async {
                    let count = self.max_cycles_async(routine).await;
                    (count, self.samples_async(count, routine).await)
                })
            }
        };
        bench.run_teardowns();
        debug!(id = %bench.id, count, samples = times.len(), "measurement finished");

        let result = BenchmarkResult {
            id: bench.id.clone(),
            name: bench.name.clone(),
            filename: bench.filename.clone(),
            stats: to_stats(full_analysis(&times, self.confidence)),
            sample_count: times.len() as u64,
            count,
            options: self.options,
            times,
        };
        bench.result = Some(result.clone());
        Ok(result)
    }
}

struct SampleCollector {
    min_samples: usize,
    max_samples: usize,
    max_time: f64,
    count: u64,
    elapsed: f64,
    spans: Vec<f64>,
}

impl SampleCollector {
    fn new(options: &BenchmarkOptions, count: u64) -> Self {
        let min_samples = options.min_samples.max(1) as usize;
        Self {
            min_samples,
            max_samples: (options.max_samples as usize).max(min_samples),
            max_time: options.max_time as f64,
            count: count.max(1),
            elapsed: 0.0,
            spans: Vec::with_capacity(min_samples),
        }
    }

    fn wants_more(&self) -> bool {
        self.spans.len() < self.min_samples
            || (self.elapsed < self.max_time && self.spans.len() < self.max_samples)
    }

    fn push(&mut self, span: f64) {
        self.elapsed += span;
        self.spans.push(span);
    }

    fn finish(self) -> Vec<f64> {
        let count = self.count as f64;
        self.spans.into_iter().map(|span| span / count).collect()
    }
}

#[inline(never)]
fn time_sync(routine: &mut Box<dyn FnMut()>, count: u64) -> f64 {
    let timer = Timer::start();
    for _ in 0..count {
        routine();
    }
    timer.elapsed_ns() as f64
}

async fn time_async(routine: &mut Box<dyn FnMut() -> LocalBoxFuture>, count: u64) -> f64 {
    let timer = Timer::start();
    for _ in 0..count {
        routine().await;
    }
    timer.elapsed_ns() as f64
}

fn to_stats(analysis: FullAnalysis) -> ResultStats {
    ResultStats {
        min: analysis.min,
        max: analysis.max,
        mean: analysis.mean,
        median: analysis.median,
        mode: analysis.mode,
        standard_deviation: analysis.standard_deviation,
        standard_error: analysis.standard_error,
        margin_of_error: analysis.margin_of_error,
    }
}
