#![warn(missing_docs)]
//! Forkbench CLI Library
//!
//! Command line, config file and the process-isolated scheduler for
//! benchmark binaries. Call `forkbench::run()` (or `forkbench_cli::run()`)
//! from `main`; the same binary is re-executed with `--forkbench-worker`
//! for every benchmark it measures.
//!
//! # Example
//!
//! ```ignore
//! use forkbench::prelude::*;
//!
//! bench_file!(|ctx| {
//!     ctx.benchmark("sum", || (0..100u64).sum::<u64>());
//! });
//!
//! fn main() {
//!     forkbench_cli::run().unwrap();
//! }
//! ```

mod config;
mod planner;
mod progress;
mod scheduler;
mod supervisor;

pub use config::*;
pub use planner::*;
pub use progress::ProgressExporter;
pub use scheduler::*;
pub use supervisor::*;

use anyhow::Context;
use clap::{Parser, Subcommand};
use forkbench_core::{BenchmarkOptions, PartialOptions, WORKER_FLAG, WorkerMain, parse_duration};
use forkbench_report::{
    ConsoleExporter, ExportManager, ExporterKind, HierarchyExporter, JsonExporter, render_tree,
};
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

/// Forkbench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "forkbench")]
#[command(author, version, about = "Forkbench - process-isolated micro-benchmarks")]
pub struct Cli {
    /// Optional subcommand (List, Run, Init); defaults to Run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Filter benchmarks by regex over their ids
    pub filter: Option<String>,

    /// Config file (default: nearest forkbench.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Exporter to attach: console, json, hierarchy (repeatable)
    #[arg(short, long = "exporter")]
    pub exporters: Vec<String>,

    /// Workers running at the same time
    #[arg(short = 'j', long)]
    pub run_parallel: Option<usize>,

    /// Slack beyond a benchmark's sampling budget before its worker is killed (e.g. "60s")
    #[arg(long)]
    pub timeout: Option<String>,

    /// Minimum time per sample (e.g. "50ms")
    #[arg(long)]
    pub min_time: Option<String>,

    /// Stop adding samples after this much sampling time (e.g. "5s")
    #[arg(long)]
    pub max_time: Option<String>,

    /// Minimum number of samples
    #[arg(long)]
    pub min_samples: Option<u64>,

    /// Maximum number of samples
    #[arg(long)]
    pub max_samples: Option<u64>,

    /// Lower bound on the calibrated repeat count
    #[arg(long)]
    pub min_iterations: Option<u64>,

    /// Upper bound on the calibrated repeat count (0 = unbounded)
    #[arg(long)]
    pub max_iterations: Option<u64>,

    /// Directory for the json exporter
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Do not draw a progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Internal: Run as worker process (used by the scheduler)
    #[arg(long, hide = true)]
    pub forkbench_worker: bool,

    /// Internal: Absorb cargo bench's --bench flag
    #[arg(long, hide = true)]
    pub bench: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all discovered benchmarks
    List,
    /// Run benchmarks (default)
    Run,
    /// Write a default forkbench.toml into the current directory
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Everything a run needs after layering config file and flags
#[derive(Debug, Clone)]
pub struct Settings {
    /// Options every benchmark file inherits
    pub base: BenchmarkOptions,
    /// Regex over benchmark ids
    pub filter: Option<Regex>,
    /// Chunk size
    pub run_parallel: usize,
    /// Worker slack beyond the sampling budget
    pub timeout: Duration,
    /// Exporters to attach
    pub exporters: Vec<ExporterKind>,
    /// Directory for the json exporter
    pub output_dir: PathBuf,
}

impl Settings {
    /// Layer `cli` over `config` over the built-in defaults.
    pub fn resolve(cli: &Cli, config: &ForkbenchConfig) -> anyhow::Result<Self> {
        let overrides = PartialOptions {
            min_time: cli.min_time.as_deref().map(parse_duration).transpose()?,
            max_time: cli.max_time.as_deref().map(parse_duration).transpose()?,
            min_samples: cli.min_samples,
            max_samples: cli.max_samples,
            min_iterations: cli.min_iterations,
            max_iterations: cli.max_iterations,
        };
        let base = config
            .to_partial_options()?
            .merge(overrides)
            .resolve(&BenchmarkOptions::default());
        base.validate()
            .map_err(|e| anyhow::anyhow!("Invalid benchmark options: {}", e))?;

        let filter = cli
            .filter
            .as_deref()
            .or(config.runner.filter.as_deref())
            .map(|pattern| {
                Regex::new(pattern).with_context(|| format!("Invalid filter {pattern:?}"))
            })
            .transpose()?;

        let timeout = match cli.timeout.as_deref() {
            Some(t) => Duration::from_nanos(parse_duration(t)?),
            None => config.timeout()?,
        };

        let names = if cli.exporters.is_empty() {
            &config.runner.exporters
        } else {
            &cli.exporters
        };
        let exporters = names
            .iter()
            .map(|name| name.parse::<ExporterKind>())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            base,
            filter,
            run_parallel: cli.run_parallel.unwrap_or(config.runner.run_parallel).max(1),
            timeout,
            exporters,
            output_dir: cli
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(&config.runner.output_dir)),
        })
    }
}

/// Run the Forkbench CLI with the process arguments.
/// This is the main entry point for benchmark binaries.
///
/// # Returns
/// `Err` when any benchmark failed, carrying the first failure.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the Forkbench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Handle worker mode first (before any other initialization)
    if cli.forkbench_worker {
        return run_worker();
    }

    init_logging(cli.verbose);

    if let Some(Commands::Init { force }) = cli.command {
        return init_config(force);
    }

    let config = load_config(&cli)?;
    let settings = Settings::resolve(&cli, &config)?;

    match cli.command {
        Some(Commands::List) => list_benchmarks(&settings),
        _ => run_benchmarks(&settings, !cli.no_progress),
    }
}

/// Whether this process was started as a worker
pub fn is_worker_invocation() -> bool {
    std::env::args().any(|arg| arg == WORKER_FLAG)
}

/// Serve one benchmark over the inherited IPC channel and exit with the
/// worker's status code.
pub fn run_worker() -> anyhow::Result<()> {
    // stdout is not ours in a worker; diagnostics go to the inherited stderr
    let _ = tracing_subscriber::fmt()
        .with_env_filter("forkbench=warn")
        .with_writer(std::io::stderr)
        .try_init();

    let mut worker = WorkerMain::new();
    let code = worker
        .run()
        .map_err(|e| anyhow::anyhow!("Worker error: {}", e))?;
    std::process::exit(code)
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        "forkbench=debug"
    } else {
        "forkbench=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(cli: &Cli) -> anyhow::Result<ForkbenchConfig> {
    if let Some(path) = &cli.config {
        return Ok(ForkbenchConfig::load(path)?);
    }
    match ForkbenchConfig::discover() {
        Some(config) => Ok(config?),
        None => Ok(ForkbenchConfig::default()),
    }
}

fn init_config(force: bool) -> anyhow::Result<()> {
    let path = std::env::current_dir()?.join(CONFIG_FILE);
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    std::fs::write(&path, ForkbenchConfig::default_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn list_benchmarks(settings: &Settings) -> anyhow::Result<()> {
    let discovered = discover(settings.base);
    let plan = build_plan(&discovered.roots, settings.filter.as_ref());

    println!("Forkbench Plan:");
    print!("{}", render_tree(&discovered.roots));
    for failure in &discovered.failures {
        println!("! {}: {}", failure.filename, failure.error);
    }

    let total = discovered.benchmark_count();
    if plan.len() == total {
        println!("{} benchmarks found.", total);
    } else {
        println!("{} of {} benchmarks selected:", plan.len(), total);
        for entry in &plan {
            println!("  {}", entry.id);
        }
    }
    Ok(())
}

fn run_benchmarks(settings: &Settings, progress: bool) -> anyhow::Result<()> {
    let discovered = discover(settings.base);
    let plan = build_plan(&discovered.roots, settings.filter.as_ref());

    if plan.is_empty() && discovered.failures.is_empty() {
        println!("No benchmarks found.");
        return Ok(());
    }

    // Progress first so the bar is finished before any table is printed
    let mut exporters = ExportManager::new();
    if progress {
        exporters.add(Box::new(ProgressExporter::new(plan.len())));
    }
    for kind in &settings.exporters {
        match kind {
            ExporterKind::Console => exporters.add(Box::new(ConsoleExporter::new())),
            ExporterKind::Json => exporters.add(Box::new(JsonExporter::new(&settings.output_dir))),
            ExporterKind::Hierarchy => exporters.add(Box::new(HierarchyExporter::new())),
        }
    }

    let scheduler = Scheduler::current_exe()?
        .with_run_parallel(settings.run_parallel)
        .with_timeout(settings.timeout);
    let report = scheduler.run(&discovered, &plan, &mut exporters);

    match report.first_error() {
        None => Ok(()),
        Some(first) => Err(anyhow::anyhow!(
            "{} benchmark(s) failed, first: {}",
            report.failures.len(),
            first
        )),
    }
}
