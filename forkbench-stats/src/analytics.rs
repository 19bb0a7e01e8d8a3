//! Sample Analytics
//!
//! Metrics reported for every benchmark result. All functions take an
//! unordered slice of samples and never mutate it.

use crate::t_table::{ConfidenceLevel, t_score};
use std::collections::BTreeMap;

/// All metrics reported for one sample vector
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FullAnalysis {
    /// Smallest sample
    pub min: f64,
    /// Largest sample
    pub max: f64,
    /// Arithmetic mean
    pub mean: f64,
    /// Middle value (mean of the two middle values for even lengths)
    pub median: f64,
    /// Most frequent value after rounding to integers
    pub mode: f64,
    /// Sample standard deviation (divisor n-1)
    pub standard_deviation: f64,
    /// Standard deviation divided by the sample count
    pub standard_error: f64,
    /// Standard error scaled by the t critical value
    pub margin_of_error: f64,
}

/// Compute every metric for `samples`
pub fn full_analysis(samples: &[f64], confidence: ConfidenceLevel) -> FullAnalysis {
    FullAnalysis {
        min: min(samples),
        max: max(samples),
        mean: mean(samples),
        median: median(samples),
        mode: mode(samples),
        standard_deviation: standard_deviation(samples),
        standard_error: standard_error(samples),
        margin_of_error: margin_of_error(samples, confidence),
    }
}

/// Minimum observation needed so that half of `smallest` is at most
/// `fraction` of it.
///
/// `reduce_uncertainty(20.0, 0.05) == 200.0`
pub fn reduce_uncertainty(smallest: f64, fraction: f64) -> f64 {
    (smallest / 2.0) / fraction
}

/// Smallest sample, 0 for an empty slice
pub fn min(samples: &[f64]) -> f64 {
    samples.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

/// Largest sample, 0 for an empty slice
pub fn max(samples: &[f64]) -> f64 {
    samples.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

/// Arithmetic mean, 0 for an empty slice
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Median of the numerically sorted samples
pub fn median(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Most common value after rounding every sample to the nearest integer.
///
/// Ties go to the smallest value.
pub fn mode(samples: &[f64]) -> f64 {
    let mut groups: BTreeMap<i64, usize> = BTreeMap::new();
    for sample in samples {
        *groups.entry(sample.round() as i64).or_default() += 1;
    }

    let mut best: Option<(i64, usize)> = None;
    for (value, count) in groups {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value as f64).unwrap_or(0.0)
}

/// Sample standard deviation with Bessel's correction.
///
/// Fewer than two samples carry no spread information and yield 0.
pub fn standard_deviation(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let mean = mean(samples);
    let squared: f64 = samples.iter().map(|s| (s - mean).powi(2)).sum();
    (squared / (samples.len() - 1) as f64).sqrt()
}

/// Standard deviation divided by the raw sample count.
///
/// Note the divisor is `n`, not `sqrt(n)`. Margins of error reported by
/// forkbench are defined against this quantity.
pub fn standard_error(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    standard_deviation(samples) / samples.len() as f64
}

/// Half-width of the confidence interval around the mean
pub fn margin_of_error(samples: &[f64], confidence: ConfidenceLevel) -> f64 {
    let df = samples.len().saturating_sub(1);
    standard_error(samples) * t_score(df, confidence)
}
