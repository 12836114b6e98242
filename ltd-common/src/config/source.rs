//! Source tracking for resolved configuration values.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Where a configuration value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "origin", rename_all = "snake_case")]
pub enum ConfigSource {
    /// Built-in default.
    Default,
    /// Config file passed with `--config-file`.
    File(PathBuf),
    /// Environment variable.
    Env(String),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Env(var) => write!(f, "env {var}"),
        }
    }
}

/// A value paired with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> Sourced<T> {
    pub fn default_value(value: T) -> Self {
        Self {
            value,
            source: ConfigSource::Default,
        }
    }

    pub fn from_env(value: T, var: impl Into<String>) -> Self {
        Self {
            value,
            source: ConfigSource::Env(var.into()),
        }
    }

    pub fn from_file(value: T, path: impl Into<PathBuf>) -> Self {
        Self {
            value,
            source: ConfigSource::File(path.into()),
        }
    }

    pub fn with_source(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}
