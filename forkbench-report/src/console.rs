//! Console table of results, followed by the list of failures.

use crate::exporter::{BenchmarkFailure, Exporter};
use crate::format_nanos;
use forkbench_ipc::BenchmarkResult;
use std::io::{self, Write};

const HEADERS: [&str; 7] = [
    "Name",
    "Measurements",
    "Iterations",
    "Median",
    "StdDev",
    "Min",
    "Max",
];

/// Prints a results table once the run finishes
pub struct ConsoleExporter<W: Write = io::Stdout> {
    out: W,
    failures: Vec<BenchmarkFailure>,
}

impl ConsoleExporter<io::Stdout> {
    /// Exporter printing to stdout
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for ConsoleExporter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> ConsoleExporter<W> {
    /// Exporter printing to `out`
    pub fn with_writer(out: W) -> Self {
        Self {
            out,
            failures: Vec::new(),
        }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_report(&mut self, results: &[BenchmarkResult]) -> io::Result<()> {
        let mut rows: Vec<[String; 7]> = results.iter().map(result_row).collect();
        rows.extend(self.failures.iter().map(failure_row));

        let mut widths = HEADERS.map(str::len);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        write_row(&mut self.out, &HEADERS.map(String::from), &widths)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(self.out, "{}", rule.join("-+-"))?;
        for row in &rows {
            write_row(&mut self.out, row, &widths)?;
        }

        if !self.failures.is_empty() {
            writeln!(self.out)?;
            writeln!(self.out, "{} benchmarks failed.", self.failures.len())?;
            for failure in &self.failures {
                writeln!(self.out, "* {} failed with:", failure.id)?;
                writeln!(self.out, "\t{}", failure.error)?;
            }
        }
        self.out.flush()
    }
}

fn result_row(result: &BenchmarkResult) -> [String; 7] {
    [
        result.id.clone(),
        result.times.len().to_string(),
        result.count.to_string(),
        format_nanos(result.stats.median),
        format_nanos(result.stats.standard_deviation),
        format_nanos(result.stats.min),
        format_nanos(result.stats.max),
    ]
}

fn failure_row(failure: &BenchmarkFailure) -> [String; 7] {
    let name = failure.id.rsplit(':').next().unwrap_or(&failure.id);
    let mut row: [String; 7] = std::array::from_fn(|_| "-".to_string());
    row[0] = name.to_string();
    row
}

fn write_row(out: &mut impl Write, cells: &[String; 7], widths: &[usize; 7]) -> io::Result<()> {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (cell, width))| {
            if i == 0 {
                format!("{cell:<width$}")
            } else {
                format!("{cell:>width$}")
            }
        })
        .collect();
    writeln!(out, "{}", padded.join(" | ").trim_end())
}

impl<W: Write> Exporter for ConsoleExporter<W> {
    fn on_error(&mut self, failure: &BenchmarkFailure) {
        self.failures.push(failure.clone());
    }

    fn on_finished(&mut self, results: &[BenchmarkResult]) {
        if let Err(e) = self.write_report(results) {
            tracing::warn!("Failed to print results table: {}", e);
        }
    }
}
