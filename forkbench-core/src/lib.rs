#![warn(missing_docs)]
//! Forkbench Core
//!
//! Everything that runs inside a benchmark binary: the timer, option
//! inheritance, the registration tree built from benchmark files, the
//! measurement engine, and the worker entry point used by process isolation.

mod discovery;
mod measure;
mod options;
mod timer;
mod tree;
mod worker;

pub use discovery::{BenchFile, DiscoveryContext, DiscoveryError, discover_all};
pub use measure::{MeasureError, Measurement};
pub use options::{OptionsError, PartialOptions, TimeUnit, parse_duration};
pub use timer::{RESOLUTION_ROUNDS, Timer, resolution_of};
pub use tree::{Benchmark, Group, Hook, LocalBoxFuture, Node, Routine};
pub use worker::{IPC_FD_ENV, WORKER_FLAG, WorkerError, WorkerMain, execute, execute_in};

pub use forkbench_ipc::{BenchmarkOptions, BenchmarkResult};

/// Text of a caught panic payload
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caught(f: fn()) -> Box<dyn std::any::Any + Send> {
        std::panic::catch_unwind(f).unwrap_err()
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(caught(|| panic!("plain")).as_ref()), "plain");
        assert_eq!(
            panic_message(caught(|| panic!("formatted {}", 42)).as_ref()),
            "formatted 42"
        );
        assert_eq!(
            panic_message(caught(|| std::panic::panic_any(7u8)).as_ref()),
            "Unknown panic"
        );
    }
}
