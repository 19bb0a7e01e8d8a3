//! IPC Message Types
//!
//! The two messages exchanged with a worker, plus the result record they
//! carry. All types derive rkyv for the wire and serde for exporters.

use crate::PROTOCOL_VERSION;
use crate::options::BenchmarkOptions;
use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduler -> worker: which benchmark to measure and how
#[derive(Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct StartMessage {
    /// Must equal [`PROTOCOL_VERSION`] on both sides
    pub protocol_version: u32,
    /// Colon-joined id of the benchmark to measure
    pub benchmark_id: String,
    /// Registered path of the file that declares it
    pub filename: String,
    /// Options that replace the ones the file declares
    pub options: BenchmarkOptions,
}

impl StartMessage {
    /// Build a start message for the current protocol version
    pub fn new(
        benchmark_id: impl Into<String>,
        filename: impl Into<String>,
        options: BenchmarkOptions,
    ) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            benchmark_id: benchmark_id.into(),
            filename: filename.into(),
            options,
        }
    }
}

/// Worker -> scheduler: the single message sent before exiting
#[derive(Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum ExitMessage {
    /// Measurement finished
    Result(BenchmarkResult),
    /// Anything went wrong inside the worker
    Error(WireError),
}

/// Error classes reported per benchmark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The benchmark file failed while registering
    Discovery,
    /// The requested id does not exist after rebuilding the tree
    BenchmarkNotFound,
    /// The benchmarked callable panicked
    Measurement,
    /// A peer broke the message protocol
    Protocol,
    /// The worker exited abnormally without reporting
    WorkerCrash,
    /// The worker outlived its watchdog
    WorkerTimeout,
}

impl ErrorKind {
    /// Name used on the wire and in reports
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Discovery => "DiscoveryError",
            ErrorKind::BenchmarkNotFound => "BenchmarkNotFoundError",
            ErrorKind::Measurement => "MeasurementError",
            ErrorKind::Protocol => "ProtocolError",
            ErrorKind::WorkerCrash => "WorkerCrashError",
            ErrorKind::WorkerTimeout => "WorkerTimeoutError",
        }
    }

    /// Reverse of [`ErrorKind::name`]
    pub fn from_name(name: &str) -> Option<Self> {
        [
            ErrorKind::Discovery,
            ErrorKind::BenchmarkNotFound,
            ErrorKind::Measurement,
            ErrorKind::Protocol,
            ErrorKind::WorkerCrash,
            ErrorKind::WorkerTimeout,
        ]
        .into_iter()
        .find(|kind| kind.name() == name)
    }
}

/// Serialized error: an explicit name plus a human-readable message
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize,
)]
#[archive(check_bytes)]
pub struct WireError {
    /// Error class, e.g. `MeasurementError`
    pub name: String,
    /// Description of what failed
    pub message: String,
}

impl WireError {
    /// Build an error of a known class
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            name: kind.name().to_string(),
            message: message.into(),
        }
    }

    /// The error class, if the name is one forkbench knows
    pub fn kind(&self) -> Option<ErrorKind> {
        ErrorKind::from_name(&self.name)
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for WireError {}

/// Per-invocation timing statistics, all in nanoseconds
#[derive(
    Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Archive, RkyvSerialize,
    RkyvDeserialize,
)]
#[archive(check_bytes)]
pub struct ResultStats {
    /// Fastest sample
    pub min: f64,
    /// Slowest sample
    pub max: f64,
    /// Mean sample
    pub mean: f64,
    /// Median sample
    pub median: f64,
    /// Most frequent rounded sample
    pub mode: f64,
    /// Sample standard deviation
    pub standard_deviation: f64,
    /// Standard deviation over sample count
    pub standard_error: f64,
    /// Half-width of the confidence interval
    pub margin_of_error: f64,
}

/// Outcome of measuring one benchmark
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize,
)]
#[archive(check_bytes)]
pub struct BenchmarkResult {
    /// Colon-joined benchmark id
    pub id: String,
    /// Benchmark name (last id segment)
    pub name: String,
    /// Registered path of the declaring file
    pub filename: String,
    /// Timing statistics over `times`
    pub stats: ResultStats,
    /// Number of samples collected
    pub sample_count: u64,
    /// Repeat count behind every sample
    pub count: u64,
    /// Options the measurement ran with
    pub options: BenchmarkOptions,
    /// Raw per-invocation sample durations in nanoseconds
    pub times: Vec<f64>,
}
