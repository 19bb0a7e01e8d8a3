#![warn(missing_docs)]
//! Forkbench Report - Run Exporters
//!
//! The scheduler publishes four events while it runs; exporters subscribe
//! to whichever they need:
//! - `on_hierarchy` once discovery is done
//! - `on_result` / `on_error` as each benchmark finishes
//! - `on_finished` after every chunk has run
//!
//! Stock exporters: console table, JSON file, hierarchy tree.

mod console;
mod exporter;
mod hierarchy;
mod json;

pub use console::ConsoleExporter;
pub use exporter::{BenchmarkFailure, ExportManager, Exporter};
pub use hierarchy::{HierarchyExporter, render_tree};
pub use json::{JsonExporter, JsonReport, generate_json_report};

use forkbench_core::TimeUnit;
use thiserror::Error;

/// Stock exporter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExporterKind {
    /// Results table on stdout
    Console,
    /// `<timestamp>.data.json` in the output directory
    Json,
    /// Tree of discovered benchmarks on stdout
    Hierarchy,
}

/// Error for an unknown exporter name
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Unknown exporter: {0} (expected console, json or hierarchy)")]
pub struct UnknownExporter(pub String);

impl std::str::FromStr for ExporterKind {
    type Err = UnknownExporter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "console" | "human" => Ok(ExporterKind::Console),
            "json" => Ok(ExporterKind::Json),
            "hierarchy" | "tree" => Ok(ExporterKind::Hierarchy),
            other => Err(UnknownExporter(other.to_string())),
        }
    }
}

/// Nanoseconds with three significant digits in the largest fitting unit
pub fn format_nanos(nanos: f64) -> String {
    let unit = TimeUnit::fitting(nanos);
    let value = nanos / unit.nanos() as f64;
    let digits = if value.abs() >= 100.0 {
        0
    } else if value.abs() >= 10.0 {
        1
    } else {
        2
    };
    format!("{value:.digits$} {}", unit.suffix())
}
