//! Exporter trait and fan-out.

use forkbench_core::Group;
use forkbench_ipc::{BenchmarkResult, WireError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A benchmark that produced an error instead of a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkFailure {
    /// Id of the failed benchmark
    pub id: String,
    /// Registered path of its file
    pub filename: String,
    /// What went wrong
    pub error: WireError,
}

impl fmt::Display for BenchmarkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed with {}", self.id, self.error)
    }
}

impl std::error::Error for BenchmarkFailure {}

/// Subscriber to run events. Every hook defaults to a no-op.
pub trait Exporter {
    /// Discovery finished; `roots` holds one root group per file
    fn on_hierarchy(&mut self, _roots: &[Group]) {}

    /// One benchmark completed
    fn on_result(&mut self, _result: &BenchmarkResult) {}

    /// One benchmark failed
    fn on_error(&mut self, _failure: &BenchmarkFailure) {}

    /// Every chunk has run
    fn on_finished(&mut self, _results: &[BenchmarkResult]) {}
}

/// Forwards every event to each registered exporter in turn
#[derive(Default)]
pub struct ExportManager {
    exporters: Vec<Box<dyn Exporter>>,
}

impl ExportManager {
    /// No exporters
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe an exporter
    pub fn add(&mut self, exporter: Box<dyn Exporter>) {
        self.exporters.push(exporter);
    }

    /// Subscribe an exporter, builder style
    pub fn with(mut self, exporter: impl Exporter + 'static) -> Self {
        self.add(Box::new(exporter));
        self
    }

    /// Number of subscribed exporters
    pub fn len(&self) -> usize {
        self.exporters.len()
    }

    /// Whether nothing is subscribed
    pub fn is_empty(&self) -> bool {
        self.exporters.is_empty()
    }
}

impl Exporter for ExportManager {
    fn on_hierarchy(&mut self, roots: &[Group]) {
        for exporter in &mut self.exporters {
            exporter.on_hierarchy(roots);
        }
    }

    fn on_result(&mut self, result: &BenchmarkResult) {
        for exporter in &mut self.exporters {
            exporter.on_result(result);
        }
    }

    fn on_error(&mut self, failure: &BenchmarkFailure) {
        for exporter in &mut self.exporters {
            exporter.on_error(failure);
        }
    }

    fn on_finished(&mut self, results: &[BenchmarkResult]) {
        for exporter in &mut self.exporters {
            exporter.on_finished(results);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forkbench_ipc::ErrorKind;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl Exporter for Recorder {
        fn on_error(&mut self, failure: &BenchmarkFailure) {
            self.0.borrow_mut().push(format!("error {}", failure.id));
        }

        fn on_finished(&mut self, results: &[BenchmarkResult]) {
            self.0.borrow_mut().push(format!("finished {}", results.len()));
        }
    }

    #[test]
    fn test_fan_out_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut manager = ExportManager::new()
            .with(Recorder(Rc::clone(&log)))
            .with(Recorder(Rc::clone(&log)));
        assert_eq!(manager.len(), 2);

        let failure = BenchmarkFailure {
            id: "f.rs:x".to_string(),
            filename: "f.rs".to_string(),
            error: WireError::new(ErrorKind::WorkerCrash, "signal 9"),
        };
        manager.on_hierarchy(&[]);
        manager.on_error(&failure);
        manager.on_finished(&[]);

        assert_eq!(
            *log.borrow(),
            ["error f.rs:x", "error f.rs:x", "finished 0", "finished 0"]
        );
        assert_eq!(
            failure.to_string(),
            "f.rs:x failed with WorkerCrashError: signal 9"
        );
    }
}
