//! JSON Output
//!
//! Writes `<timestamp>.data.json` into the output directory when the run
//! finishes.

use crate::exporter::{BenchmarkFailure, Exporter};
use chrono::{DateTime, Utc};
use forkbench_ipc::BenchmarkResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Contents of a JSON report file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonReport {
    /// When the run finished
    pub timestamp: DateTime<Utc>,
    /// Successful benchmarks, in completion order
    pub results: Vec<BenchmarkResult>,
    /// Failed benchmarks
    pub failures: Vec<BenchmarkFailure>,
}

/// Generate a prettified JSON report.
pub fn generate_json_report(report: &JsonReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

/// Dumps every result to a timestamped file
pub struct JsonExporter {
    dir: PathBuf,
    failures: Vec<BenchmarkFailure>,
    written: Option<PathBuf>,
}

impl JsonExporter {
    /// Exporter writing into `dir`, created on demand
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            failures: Vec::new(),
            written: None,
        }
    }

    /// Path of the last report written
    pub fn written(&self) -> Option<&Path> {
        self.written.as_deref()
    }

    fn write_report(&self, report: &JsonReport) -> std::io::Result<PathBuf> {
        let json = generate_json_report(report)?;
        std::fs::create_dir_all(&self.dir)?;
        let stamp = report.timestamp.format("%Y-%m-%dT%H-%M-%S%.3fZ");
        let path = self.dir.join(format!("{stamp}.data.json"));
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

impl Exporter for JsonExporter {
    fn on_error(&mut self, failure: &BenchmarkFailure) {
        self.failures.push(failure.clone());
    }

    fn on_finished(&mut self, results: &[BenchmarkResult]) {
        let report = JsonReport {
            timestamp: Utc::now(),
            results: results.to_vec(),
            failures: std::mem::take(&mut self.failures),
        };
        match self.write_report(&report) {
            Ok(path) => {
                tracing::info!("Wrote JSON report to {}", path.display());
                self.written = Some(path);
            }
            Err(e) => tracing::error!("Failed to write JSON report: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forkbench_ipc::{BenchmarkOptions, ErrorKind, ResultStats, WireError};

    #[test]
    fn test_writes_timestamped_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = JsonExporter::new(dir.path().join("reports"));

        exporter.on_error(&BenchmarkFailure {
            id: "b.rs:bad".to_string(),
            filename: "b.rs".to_string(),
            error: WireError::new(ErrorKind::WorkerTimeout, "took too long"),
        });
        let result = BenchmarkResult {
            id: "b.rs:good".to_string(),
            name: "good".to_string(),
            filename: "b.rs".to_string(),
            stats: ResultStats::default(),
            sample_count: 5,
            count: 10,
            options: BenchmarkOptions::default(),
            times: vec![1.0, 2.0],
        };
        exporter.on_finished(std::slice::from_ref(&result));

        let path = exporter.written().unwrap().to_path_buf();
        assert!(path.file_name().unwrap().to_str().unwrap().ends_with(".data.json"));

        let report: JsonReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(report.results, vec![result]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].error.name, "WorkerTimeoutError");
    }
}
