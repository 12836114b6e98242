//! Structured logging setup for the CLI.
//!
//! Events go to stderr (pretty, compact or JSON). An optional log file
//! receives JSON lines through a non-blocking writer; keep the returned
//! [`LogGuard`] alive until exit so buffered lines are flushed.

use crate::config::{EnvParser, Sourced};
use crate::errors::{LifetimeError, Result};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Output format for stderr logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (pretty, compact, json)")),
        }
    }
}

/// Logging options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

impl LogConfig {
    /// Read `LTD_LOG_LEVEL`, `LTD_LOG_FORMAT` and `LTD_LOG_FILE`.
    ///
    /// Invalid values fall back to the defaults.
    pub fn from_env() -> Self {
        let mut parser = EnvParser::new("LTD_");
        let defaults = Self::default();
        let level = parser
            .get_log_level("LOG_LEVEL", Sourced::default_value(defaults.level))
            .value;
        let format = parser
            .get_string("LOG_FORMAT", Sourced::default_value("pretty".to_string()))
            .value
            .parse()
            .unwrap_or_default();
        let file = parser
            .get_optional_string("LOG_FILE", Sourced::default_value(None))
            .value
            .map(PathBuf::from);
        Self {
            level,
            format,
            file,
        }
    }

    /// Apply `-v`/`-q` flags on top of the configured level.
    #[must_use]
    pub fn with_verbosity(mut self, verbose: bool, quiet: bool) -> Self {
        if verbose {
            self.level = "debug".to_string();
        } else if quiet {
            self.level = "warn".to_string();
        }
        self
    }

    fn directive(&self) -> String {
        format!("ltd={0},ltd_common={0},warn", self.level)
    }
}

/// Keeps the file writer alive.
#[must_use = "dropping the guard stops the file writer"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LogConfig) -> Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.directive()));

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
    });

    let mut file_guard = None;
    if let Some(path) = &config.file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LifetimeError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| LifetimeError::io(path, e))?;
        let (writer, guard) = tracing_appender::non_blocking(file);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
        file_guard = Some(guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| LifetimeError::Logging(e.to_string()))?;

    Ok(LogGuard { _file: file_guard })
}
