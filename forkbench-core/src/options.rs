//! Option Inheritance
//!
//! Benchmarks and groups declare a [`PartialOptions`] record. Each node's
//! resolved [`BenchmarkOptions`] is its parent's resolved options with the
//! declared fields laid on top.

use forkbench_ipc::BenchmarkOptions;
use thiserror::Error;

/// Units for expressing durations, with their nanosecond multipliers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimeUnit {
    /// 1 ns
    Nanosecond,
    /// 1e3 ns
    Microsecond,
    /// 1e6 ns
    Millisecond,
    /// 1e9 ns
    Second,
    /// 60e9 ns
    Minute,
    /// 3600e9 ns
    Hour,
}

impl TimeUnit {
    /// Every unit, smallest first
    pub const ALL: [TimeUnit; 6] = [
        TimeUnit::Nanosecond,
        TimeUnit::Microsecond,
        TimeUnit::Millisecond,
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
    ];

    /// Nanoseconds in one unit
    pub const fn nanos(self) -> u64 {
        match self {
            TimeUnit::Nanosecond => 1,
            TimeUnit::Microsecond => 1_000,
            TimeUnit::Millisecond => 1_000_000,
            TimeUnit::Second => 1_000_000_000,
            TimeUnit::Minute => 60_000_000_000,
            TimeUnit::Hour => 3_600_000_000_000,
        }
    }

    /// `value` units expressed in nanoseconds
    pub fn of(self, value: f64) -> u64 {
        (value * self.nanos() as f64) as u64
    }

    /// Short suffix used when printing
    pub const fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Nanosecond => "ns",
            TimeUnit::Microsecond => "us",
            TimeUnit::Millisecond => "ms",
            TimeUnit::Second => "s",
            TimeUnit::Minute => "min",
            TimeUnit::Hour => "h",
        }
    }

    /// Largest unit in which `nanos` is still at least 1
    pub fn fitting(nanos: f64) -> TimeUnit {
        Self::ALL
            .into_iter()
            .rev()
            .find(|unit| nanos.abs() >= unit.nanos() as f64)
            .unwrap_or(TimeUnit::Nanosecond)
    }

    fn from_suffix(suffix: &str) -> Option<TimeUnit> {
        match suffix.to_lowercase().as_str() {
            "ns" => Some(TimeUnit::Nanosecond),
            "us" | "µs" => Some(TimeUnit::Microsecond),
            "ms" => Some(TimeUnit::Millisecond),
            "s" | "" => Some(TimeUnit::Second),
            "m" | "min" => Some(TimeUnit::Minute),
            "h" => Some(TimeUnit::Hour),
            _ => None,
        }
    }
}

/// Errors raised while building options from text
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionsError {
    /// Nothing to parse
    #[error("empty duration string")]
    EmptyDuration,

    /// The numeric part is not a non-negative number
    #[error("invalid duration number '{0}'")]
    InvalidNumber(String),

    /// The suffix is not a known unit
    #[error("unknown duration unit '{0}'")]
    UnknownUnit(String),

    /// Resolved options break a bound
    #[error("invalid options: {0}")]
    Invalid(String),
}

/// Parse a duration such as `"50ms"`, `"1.5s"` or `"2m"` to nanoseconds.
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Result<u64, OptionsError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(OptionsError::EmptyDuration);
    }

    let split = s
        .char_indices()
        .find(|(_, c)| c.is_alphabetic() || *c == 'µ')
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    let (number, suffix) = s.split_at(split);

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| OptionsError::InvalidNumber(number.to_string()))?;
    if value < 0.0 || !value.is_finite() {
        return Err(OptionsError::InvalidNumber(number.to_string()));
    }
    let unit =
        TimeUnit::from_suffix(suffix).ok_or_else(|| OptionsError::UnknownUnit(suffix.to_string()))?;
    Ok(unit.of(value))
}

/// Explicitly declared options; `None` fields inherit from the parent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartialOptions {
    /// See [`BenchmarkOptions::min_time`]
    pub min_time: Option<u64>,
    /// See [`BenchmarkOptions::max_time`]
    pub max_time: Option<u64>,
    /// See [`BenchmarkOptions::min_samples`]
    pub min_samples: Option<u64>,
    /// See [`BenchmarkOptions::max_samples`]
    pub max_samples: Option<u64>,
    /// See [`BenchmarkOptions::min_iterations`]
    pub min_iterations: Option<u64>,
    /// See [`BenchmarkOptions::max_iterations`]
    pub max_iterations: Option<u64>,
}

impl PartialOptions {
    /// No declared fields
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `min_time` in nanoseconds
    pub fn min_time(mut self, nanos: u64) -> Self {
        self.min_time = Some(nanos);
        self
    }

    /// Declare `max_time` in nanoseconds
    pub fn max_time(mut self, nanos: u64) -> Self {
        self.max_time = Some(nanos);
        self
    }

    /// Declare `min_samples`
    pub fn min_samples(mut self, samples: u64) -> Self {
        self.min_samples = Some(samples);
        self
    }

    /// Declare `max_samples`
    pub fn max_samples(mut self, samples: u64) -> Self {
        self.max_samples = Some(samples);
        self
    }

    /// Declare `min_iterations`
    pub fn min_iterations(mut self, iterations: u64) -> Self {
        self.min_iterations = Some(iterations);
        self
    }

    /// Declare `max_iterations` (0 = unbounded)
    pub fn max_iterations(mut self, iterations: u64) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    /// Whether nothing is declared
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Lay `child` over `self`; declared child fields win
    pub fn merge(self, child: PartialOptions) -> PartialOptions {
        PartialOptions {
            min_time: child.min_time.or(self.min_time),
            max_time: child.max_time.or(self.max_time),
            min_samples: child.min_samples.or(self.min_samples),
            max_samples: child.max_samples.or(self.max_samples),
            min_iterations: child.min_iterations.or(self.min_iterations),
            max_iterations: child.max_iterations.or(self.max_iterations),
        }
    }

    /// Resolve against the parent's options.
    ///
    /// A declared `min_samples` of 0 is ignored, since at least one sample
    /// is always taken.
    pub fn resolve(&self, parent: &BenchmarkOptions) -> BenchmarkOptions {
        BenchmarkOptions {
            min_time: self.min_time.unwrap_or(parent.min_time),
            max_time: self.max_time.unwrap_or(parent.max_time),
            min_samples: self
                .min_samples
                .filter(|samples| *samples > 0)
                .unwrap_or(parent.min_samples),
            max_samples: self.max_samples.unwrap_or(parent.max_samples),
            min_iterations: self.min_iterations.unwrap_or(parent.min_iterations),
            max_iterations: self.max_iterations.unwrap_or(parent.max_iterations),
        }
    }
}

impl From<BenchmarkOptions> for PartialOptions {
    fn from(options: BenchmarkOptions) -> Self {
        PartialOptions {
            min_time: Some(options.min_time),
            max_time: Some(options.max_time),
            min_samples: Some(options.min_samples),
            max_samples: Some(options.max_samples),
            min_iterations: Some(options.min_iterations),
            max_iterations: Some(options.max_iterations),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_multipliers() {
        assert_eq!(TimeUnit::Nanosecond.of(5.0), 5);
        assert_eq!(TimeUnit::Microsecond.of(2.5), 2_500);
        assert_eq!(TimeUnit::Millisecond.of(50.0), 50_000_000);
        assert_eq!(TimeUnit::Second.of(1.0), 1_000_000_000);
        assert_eq!(TimeUnit::Minute.of(1.0), 60_000_000_000);
        assert_eq!(TimeUnit::Hour.of(1.0), 3_600_000_000_000);
    }

    #[test]
    fn test_fitting_unit() {
        assert_eq!(TimeUnit::fitting(999.0), TimeUnit::Nanosecond);
        assert_eq!(TimeUnit::fitting(1_000.0), TimeUnit::Microsecond);
        assert_eq!(TimeUnit::fitting(2.5e9), TimeUnit::Second);
        assert_eq!(TimeUnit::fitting(0.0), TimeUnit::Nanosecond);
        assert_eq!(TimeUnit::fitting(7_200e9), TimeUnit::Hour);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("3s").unwrap(), 3_000_000_000);
        assert_eq!(parse_duration("500ms").unwrap(), 500_000_000);
        assert_eq!(parse_duration("100us").unwrap(), 100_000);
        assert_eq!(parse_duration("1000ns").unwrap(), 1000);
        assert_eq!(parse_duration("2m").unwrap(), 120_000_000_000);
        assert_eq!(parse_duration("1h").unwrap(), 3_600_000_000_000);
        assert_eq!(parse_duration("1.5s").unwrap(), 1_500_000_000);
        assert_eq!(parse_duration("2").unwrap(), 2_000_000_000);
        assert_eq!(parse_duration(" 20 ms ").unwrap(), 20_000_000);
    }

    #[test]
    fn test_parse_duration_errors() {
        assert_eq!(parse_duration(""), Err(OptionsError::EmptyDuration));
        assert!(matches!(parse_duration("fast"), Err(OptionsError::InvalidNumber(_))));
        assert!(matches!(parse_duration("3 weeks"), Err(OptionsError::UnknownUnit(_))));
        assert!(matches!(parse_duration("-1s"), Err(OptionsError::InvalidNumber(_))));
    }

    #[test]
    fn test_resolve_inherits_undeclared_fields() {
        let parent = BenchmarkOptions::default();
        let resolved = PartialOptions::new().min_time(20).resolve(&parent);
        assert_eq!(resolved.min_time, 20);
        assert_eq!(resolved.max_time, parent.max_time);
        assert_eq!(resolved.min_samples, parent.min_samples);
    }

    #[test]
    fn test_resolve_ignores_zero_min_samples() {
        let parent = BenchmarkOptions::default();
        let resolved = PartialOptions::new().min_samples(0).resolve(&parent);
        assert_eq!(resolved.min_samples, parent.min_samples);
    }

    #[test]
    fn test_merge_child_wins() {
        let parent = PartialOptions::new().min_time(10).max_samples(7);
        let child = PartialOptions::new().min_time(99).min_samples(2);
        let merged = parent.merge(child);
        assert_eq!(merged.min_time, Some(99));
        assert_eq!(merged.max_samples, Some(7));
        assert_eq!(merged.min_samples, Some(2));
        assert_eq!(merged.max_time, None);
        assert!(PartialOptions::new().is_empty());
        assert!(!merged.is_empty());
    }

    #[test]
    fn test_full_partial_resolves_to_itself() {
        let options = BenchmarkOptions {
            min_time: 1,
            max_time: 2,
            min_samples: 3,
            max_samples: 4,
            min_iterations: 5,
            max_iterations: 6,
        };
        assert_eq!(
            PartialOptions::from(options).resolve(&BenchmarkOptions::default()),
            options
        );
    }
}
