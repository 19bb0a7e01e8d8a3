#![warn(missing_docs)]
//! Forkbench Statistical Engine
//!
//! Pure functions over a vector of per-invocation timing samples:
//! - Central tendency (mean, median, mode) and extremes (min, max)
//! - Sample standard deviation and standard error
//! - Margin of error from a fixed Student's t table
//! - The uncertainty bound used to derive a minimum observation time

mod analytics;
mod t_table;

pub use analytics::{
    FullAnalysis, full_analysis, margin_of_error, max, mean, median, min, mode,
    reduce_uncertainty, standard_deviation, standard_error,
};
pub use t_table::{ConfidenceLevel, ParseConfidenceError, t_score};

/// Fraction of timer-resolution uncertainty tolerated in a single timed span (1%)
pub const RESOLUTION_UNCERTAINTY: f64 = 0.01;
