//! Scheduler tests against real worker processes.
//!
//! Runs without the libtest harness: the scheduler re-executes this binary
//! with `--forkbench-worker`, so `main` hands those invocations to the
//! worker before running anything else.

use forkbench::prelude::*;
use forkbench::{
    BenchmarkFailure, BenchmarkOptions, BenchmarkResult, Discovered, ErrorKind, Exporter,
    PlanEntry, RunReport, Scheduler, build_plan, discover,
};
use std::time::{Duration, Instant};

const FILE: &str = "scheduler-tests/suite.rs";

bench_file!("scheduler-tests/suite.rs", |ctx| {
    let quick = PartialOptions::new()
        .min_time(100_000)
        .max_time(5_000_000)
        .min_samples(2)
        .max_samples(5);
    ctx.group_with("suite", quick, |ctx| {
        ctx.benchmark("first", || (0..64u64).sum::<u64>());
        ctx.benchmark("second", || -> u64 { panic!("second always throws") });
        ctx.benchmark("third", || (1..16u64).product::<u64>());
        ctx.benchmark("abort", || -> u64 { std::process::abort() });
        ctx.benchmark("silent-exit", || -> u64 { std::process::exit(0) });
        ctx.benchmark("hang", || std::thread::sleep(Duration::from_secs(30)));
    });
});

#[derive(Default)]
struct Events(Vec<String>);

impl Exporter for Events {
    fn on_result(&mut self, result: &BenchmarkResult) {
        self.0.push(format!("result {}", result.name));
    }

    fn on_error(&mut self, failure: &BenchmarkFailure) {
        self.0.push(format!("error {}", failure.id.rsplit(':').next().unwrap()));
    }

    fn on_finished(&mut self, results: &[BenchmarkResult]) {
        self.0.push(format!("finished {}", results.len()));
    }
}

fn plan(names: &[&str]) -> Vec<PlanEntry> {
    let discovered = discover(BenchmarkOptions::default());
    let all = build_plan(&discovered.roots, None);
    names
        .iter()
        .map(|name| {
            let id = format!("{FILE}:suite:{name}");
            all.iter()
                .find(|entry| entry.id == id)
                .cloned()
                .unwrap_or(PlanEntry {
                    id,
                    filename: FILE.to_string(),
                    options: BenchmarkOptions::default(),
                })
        })
        .collect()
}

fn run(scheduler: Scheduler, names: &[&str]) -> (RunReport, Vec<String>) {
    let mut events = Events::default();
    let report = scheduler.run(&Discovered::default(), &plan(names), &mut events);
    (report, events.0)
}

fn scheduler() -> Scheduler {
    Scheduler::current_exe()
        .unwrap()
        .with_timeout(Duration::from_secs(30))
}

fn only_error(report: &RunReport) -> &BenchmarkFailure {
    assert_eq!(report.failures.len(), 1, "failures: {:?}", report.failures);
    &report.failures[0]
}

fn test_partial_failure_runs_every_chunk() {
    let (report, events) = run(scheduler().with_run_parallel(1), &["first", "second", "third"]);

    let ids: Vec<&str> = report.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(
        ids,
        [
            "scheduler-tests/suite.rs:suite:first",
            "scheduler-tests/suite.rs:suite:third"
        ]
    );
    let failure = only_error(&report);
    assert_eq!(failure.id, "scheduler-tests/suite.rs:suite:second");
    assert_eq!(failure.error.kind(), Some(ErrorKind::Measurement));
    assert!(failure.error.message.contains("second always throws"));
    assert_eq!(report.first_error(), Some(failure));
    assert!(!report.is_success());

    assert_eq!(
        events,
        ["result first", "error second", "result third", "finished 2"]
    );
    for result in &report.results {
        assert!((2..=5).contains(&result.sample_count));
        assert_eq!(result.filename, FILE);
    }
}

fn test_parallel_chunks() {
    let (report, events) = run(scheduler().with_run_parallel(2), &["first", "second", "third"]);

    let mut names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
    names.sort();
    assert_eq!(names, ["first", "third"]);
    assert_eq!(only_error(&report).error.name, "MeasurementError");
    // Chunk [first, second] resolves before chunk [third] starts
    assert_eq!(events[2], "result third");
    assert_eq!(events[3], "finished 2");
}

fn test_missing_benchmark() {
    let (report, _) = run(scheduler(), &["missing"]);
    assert!(report.results.is_empty());
    assert_eq!(
        only_error(&report).error.kind(),
        Some(ErrorKind::BenchmarkNotFound)
    );
}

fn test_crash_without_message() {
    let (report, _) = run(scheduler(), &["abort", "first"]);
    assert_eq!(report.results.len(), 1);
    let failure = only_error(&report);
    assert_eq!(failure.id, "scheduler-tests/suite.rs:suite:abort");
    assert_eq!(failure.error.kind(), Some(ErrorKind::WorkerCrash));
}

fn test_clean_exit_without_message() {
    let (report, _) = run(scheduler(), &["silent-exit"]);
    assert_eq!(only_error(&report).error.kind(), Some(ErrorKind::Protocol));
}

fn test_watchdog_kills_hanging_worker() {
    let started = Instant::now();
    let (report, _) = run(
        scheduler().with_timeout(Duration::from_millis(500)),
        &["hang"],
    );
    assert_eq!(
        only_error(&report).error.kind(),
        Some(ErrorKind::WorkerTimeout)
    );
    assert!(started.elapsed() < Duration::from_secs(10));
}

fn main() {
    if forkbench::is_worker_invocation() {
        if let Err(e) = forkbench::run_worker() {
            eprintln!("{e}");
            std::process::exit(1);
        }
        return;
    }

    let tests: [(&str, fn()); 6] = [
        (
            "partial_failure_runs_every_chunk",
            test_partial_failure_runs_every_chunk,
        ),
        ("parallel_chunks", test_parallel_chunks),
        ("missing_benchmark", test_missing_benchmark),
        ("crash_without_message", test_crash_without_message),
        ("clean_exit_without_message", test_clean_exit_without_message),
        ("watchdog_kills_hanging_worker", test_watchdog_kills_hanging_worker),
    ];

    println!("\nrunning {} tests", tests.len());
    for (name, test) in tests {
        test();
        println!("test {name} ... ok");
    }
    println!("\ntest result: ok. {} passed", tests.len());
}
