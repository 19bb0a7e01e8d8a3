//! Resolved benchmark options as they travel over the wire.

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};

/// Fully resolved measurement options for one benchmark.
///
/// Durations are nanoseconds. An iteration bound of 0 means unbounded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize,
)]
#[archive(check_bytes)]
pub struct BenchmarkOptions {
    /// Minimum duration of a single timed span during calibration
    pub min_time: u64,
    /// Budget for the cumulative time of the sampling phase
    pub max_time: u64,
    /// Samples collected unconditionally
    pub min_samples: u64,
    /// Upper bound on collected samples
    pub max_samples: u64,
    /// Lower bound on the repeat count per sample
    pub min_iterations: u64,
    /// Upper bound on the repeat count per sample (0 = unbounded)
    pub max_iterations: u64,
}

impl Default for BenchmarkOptions {
    fn default() -> Self {
        Self {
            min_time: 50_000_000,
            max_time: 5_000_000_000,
            min_samples: 5,
            max_samples: 5000,
            min_iterations: 0,
            max_iterations: 0,
        }
    }
}

impl BenchmarkOptions {
    /// Validate the options
    pub fn validate(&self) -> Result<(), String> {
        if self.min_samples == 0 {
            return Err("min_samples must be > 0".to_string());
        }
        if self.max_samples < self.min_samples {
            return Err(format!(
                "max_samples ({}) must be >= min_samples ({})",
                self.max_samples, self.min_samples
            ));
        }
        if self.max_iterations > 0 && self.max_iterations < self.min_iterations {
            return Err(format!(
                "max_iterations ({}) must be >= min_iterations ({})",
                self.max_iterations, self.min_iterations
            ));
        }
        Ok(())
    }

    /// Upper bound on the repeat count, if any
    pub fn iteration_limit(&self) -> Option<u64> {
        (self.max_iterations > 0).then_some(self.max_iterations)
    }
}
