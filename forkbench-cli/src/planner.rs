//! Run Planner
//!
//! Discovers every registered benchmark file and flattens the resulting
//! trees into the ordered list of entries the scheduler runs. The order is
//! discovery order: files sorted by path, then depth first.

use forkbench_core::{BenchmarkOptions, Group, discover_all};
use forkbench_ipc::{ErrorKind, WireError};
use forkbench_report::BenchmarkFailure;
use regex::Regex;

/// One benchmark to run in its own worker
#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry {
    /// Benchmark id
    pub id: String,
    /// Registered path of the declaring file
    pub filename: String,
    /// Options sent to the worker
    pub options: BenchmarkOptions,
}

/// Outcome of a discovery pass over every registered file
#[derive(Debug, Default)]
pub struct Discovered {
    /// One root group per file that loaded
    pub roots: Vec<Group>,
    /// Files that failed to load, keyed by path
    pub failures: Vec<BenchmarkFailure>,
}

impl Discovered {
    /// Number of benchmarks across all roots
    pub fn benchmark_count(&self) -> usize {
        self.roots.iter().map(Group::benchmark_count).sum()
    }
}

/// Load every registered file on top of `base` options
pub fn discover(base: BenchmarkOptions) -> Discovered {
    let (roots, errors) = discover_all(base);
    let failures = errors
        .into_iter()
        .map(|(file, error)| BenchmarkFailure {
            id: file.clone(),
            filename: file,
            error: WireError::new(ErrorKind::Discovery, error.to_string()),
        })
        .collect();
    Discovered { roots, failures }
}

/// Flatten `roots` into plan entries, keeping ids matched by `filter`
pub fn build_plan(roots: &[Group], filter: Option<&Regex>) -> Vec<PlanEntry> {
    roots
        .iter()
        .flat_map(Group::benchmarks)
        .filter(|bench| filter.is_none_or(|re| re.is_match(&bench.id)))
        .map(|bench| PlanEntry {
            id: bench.id.clone(),
            filename: bench.filename.clone(),
            options: bench.options,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use forkbench_core::{DiscoveryContext, PartialOptions};

    fn roots() -> Vec<Group> {
        let mut ctx = DiscoveryContext::default();
        let parse = ctx
            .load("parse.rs", |ctx| {
                ctx.group_with("json", PartialOptions::new().min_samples(10), |ctx| {
                    ctx.benchmark("small", || 1);
                    ctx.benchmark("large", || 2);
                });
                ctx.benchmark("toml", || 3);
            })
            .unwrap();
        let sort = ctx
            .load("sort.rs", |ctx| {
                ctx.benchmark("quick", || 4);
            })
            .unwrap();
        vec![parse, sort]
    }

    #[test]
    fn test_plan_keeps_discovery_order() {
        let plan = build_plan(&roots(), None);
        let ids: Vec<&str> = plan.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "parse.rs:json:small",
                "parse.rs:json:large",
                "parse.rs:toml",
                "sort.rs:quick"
            ]
        );
        assert_eq!(plan[0].filename, "parse.rs");
        assert_eq!(plan[0].options.min_samples, 10);
        assert_eq!(plan[2].options, BenchmarkOptions::default());
    }

    #[test]
    fn test_regex_filter() {
        let re = Regex::new("json").unwrap();
        let plan = build_plan(&roots(), Some(&re));
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|entry| entry.id.contains(":json:")));

        let none = Regex::new("^nothing$").unwrap();
        assert!(build_plan(&roots(), Some(&none)).is_empty());
    }
}
