//! Configuration loading from forkbench.toml
//!
//! The file is discovered by walking up from the current directory.
//! Command-line flags override anything set here.

use forkbench_core::{OptionsError, PartialOptions, parse_duration};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the configuration file
pub const CONFIG_FILE: &str = "forkbench.toml";

/// Errors raised while loading or interpreting the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        /// File that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema
    #[error("Failed to parse {path}: {source}")]
    Parse {
        /// File that was parsed
        path: PathBuf,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },

    /// A value parsed but is not a valid option
    #[error("Invalid {field}: {source}")]
    Option {
        /// Offending key
        field: &'static str,
        /// Why the value was rejected
        #[source]
        source: OptionsError,
    },
}

/// Forkbench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ForkbenchConfig {
    /// Base options every benchmark inherits
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
    /// Scheduling and output
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// Base benchmark options; unset fields keep the built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BenchmarkConfig {
    /// Minimum time per sample (e.g. "50ms")
    #[serde(default)]
    pub min_time: Option<String>,
    /// Sampling stops adding samples past this total time (e.g. "5s")
    #[serde(default)]
    pub max_time: Option<String>,
    /// Samples collected regardless of time spent
    #[serde(default)]
    pub min_samples: Option<u64>,
    /// Upper bound on samples
    #[serde(default)]
    pub max_samples: Option<u64>,
    /// Lower bound on the calibrated repeat count
    #[serde(default)]
    pub min_iterations: Option<u64>,
    /// 0 = unbounded
    #[serde(default)]
    pub max_iterations: Option<u64>,
}

/// Runner configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunnerConfig {
    /// Workers running at the same time
    #[serde(default = "default_run_parallel")]
    pub run_parallel: usize,
    /// Worker slack beyond the sampling budget (e.g. "60s", "5m")
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// Exporters: "console", "json", "hierarchy"
    #[serde(default = "default_exporters")]
    pub exporters: Vec<String>,
    /// Directory for the JSON exporter
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Regex over benchmark ids
    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            run_parallel: default_run_parallel(),
            timeout: default_timeout(),
            exporters: default_exporters(),
            output_dir: default_output_dir(),
            filter: None,
        }
    }
}

fn default_run_parallel() -> usize {
    1
}
fn default_timeout() -> String {
    "60s".to_string()
}
fn default_exporters() -> Vec<String> {
    vec!["console".to_string()]
}
fn default_output_dir() -> String {
    "target/forkbench".to_string()
}

impl ForkbenchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Walk up from the current directory and load the first config file
    /// found.
    pub fn discover() -> Option<Result<Self, ConfigError>> {
        let mut dir = std::env::current_dir().ok()?;
        Self::discover_from(&mut dir)
    }

    fn discover_from(dir: &mut PathBuf) -> Option<Result<Self, ConfigError>> {
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.is_file() {
                return Some(Self::load(&config_path));
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// The `[benchmark]` table as options to lay over the defaults
    pub fn to_partial_options(&self) -> Result<PartialOptions, ConfigError> {
        let b = &self.benchmark;
        let duration = |field: &'static str, value: &Option<String>| {
            value
                .as_deref()
                .map(parse_duration)
                .transpose()
                .map_err(|source| ConfigError::Option { field, source })
        };
        Ok(PartialOptions {
            min_time: duration("min_time", &b.min_time)?,
            max_time: duration("max_time", &b.max_time)?,
            min_samples: b.min_samples,
            max_samples: b.max_samples,
            min_iterations: b.min_iterations,
            max_iterations: b.max_iterations,
        })
    }

    /// Worker watchdog
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.runner.timeout)
            .map(Duration::from_nanos)
            .map_err(|source| ConfigError::Option {
                field: "timeout",
                source,
            })
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# Forkbench Configuration

[benchmark]
# Minimum time per sample; raised automatically on coarse clocks
min_time = "50ms"
# Stop adding samples once this much time was spent sampling
max_time = "5s"
min_samples = 5
max_samples = 5000
# Bounds on the calibrated repeat count (0 = unbounded)
min_iterations = 0
max_iterations = 0

[runner]
# Workers running at the same time
run_parallel = 1
# Slack beyond a benchmark's sampling budget before its worker is killed
timeout = "60s"
# Any of "console", "json", "hierarchy"
exporters = ["console"]
# Where the json exporter writes <timestamp>.data.json
output_dir = "target/forkbench"
# Regex over benchmark ids (uncomment to enable)
# filter = "parse"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forkbench_core::BenchmarkOptions;

    #[test]
    fn test_default_config() {
        let config = ForkbenchConfig::default();
        assert_eq!(config.runner.run_parallel, 1);
        assert_eq!(config.runner.exporters, ["console"]);
        assert_eq!(config.timeout().unwrap(), Duration::from_secs(60));
        assert!(config.to_partial_options().unwrap().is_empty());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [benchmark]
            min_time = "20ms"
            min_samples = 2

            [runner]
            run_parallel = 4
            exporters = ["console", "json"]
        "#;

        let config: ForkbenchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.runner.run_parallel, 4);
        assert_eq!(config.runner.exporters, ["console", "json"]);
        // Defaults should still apply
        assert_eq!(config.runner.timeout, "60s");

        let resolved = config
            .to_partial_options()
            .unwrap()
            .resolve(&BenchmarkOptions::default());
        assert_eq!(resolved.min_time, 20_000_000);
        assert_eq!(resolved.min_samples, 2);
        assert_eq!(resolved.max_time, BenchmarkOptions::default().max_time);
    }

    #[test]
    fn test_bad_duration_names_the_field() {
        let config: ForkbenchConfig = toml::from_str("[benchmark]\nmax_time = \"soon\"").unwrap();
        let err = config.to_partial_options().unwrap_err();
        assert!(err.to_string().starts_with("Invalid max_time"));
    }

    #[test]
    fn test_default_toml_parses() {
        let config: ForkbenchConfig = toml::from_str(&ForkbenchConfig::default_toml()).unwrap();
        assert_eq!(config.runner.output_dir, "target/forkbench");
        assert_eq!(
            config
                .to_partial_options()
                .unwrap()
                .resolve(&BenchmarkOptions::default()),
            BenchmarkOptions::default()
        );
    }

    #[test]
    fn test_discover_walks_up() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(
            root.path().join(CONFIG_FILE),
            "[runner]\nrun_parallel = 3\n",
        )
        .unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let mut dir = nested;
        let config = ForkbenchConfig::discover_from(&mut dir).unwrap().unwrap();
        assert_eq!(config.runner.run_parallel, 3);
    }
}
