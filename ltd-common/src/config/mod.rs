//! Pipeline configuration.
//!
//! Values resolve in layers, lowest to highest:
//! - Built-in defaults ([`PipelineConfig::default`])
//! - A config file (`--config-file`), TOML or dotenv style
//! - Legacy `ENV_*` variables (`ENV_DEPLOYMENT_TIMEOUT_IN_SECS`, `ENV_SSL_CERT_VERIFY`)
//! - `LTD_*` environment variables
//!
//! Each resolved value keeps its [`ConfigSource`] for `--verbose` output.

pub mod env;
pub mod file;
pub mod source;

pub use env::{EnvError, EnvParser};
pub use file::load_config_file;
pub use source::{ConfigSource, Sourced};

use crate::errors::ErrorCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default notes attached to deployment plans.
pub const DEFAULT_DEPLOYMENT_MESSAGE: &str = "Automated deploy using OS Pipelines";

pub const QUEUE_TIMEOUT_IN_SECS: &str = "QUEUE_TIMEOUT_IN_SECS";
pub const DEPLOYMENT_TIMEOUT_IN_SECS: &str = "DEPLOYMENT_TIMEOUT_IN_SECS";
pub const SLEEP_PERIOD_IN_SECS: &str = "SLEEP_PERIOD_IN_SECS";
pub const REDEPLOY_OUTDATED_APPS: &str = "REDEPLOY_OUTDATED_APPS";
pub const ALLOW_CONTINUE_WITH_ERRORS: &str = "ALLOW_CONTINUE_WITH_ERRORS";
pub const SSL_CERT_VERIFY: &str = "SSL_CERT_VERIFY";
pub const MAX_VERSIONS_TO_RETURN: &str = "MAX_VERSIONS_TO_RETURN";
pub const TAG_APP_MAX_RETRIES: &str = "TAG_APP_MAX_RETRIES";
pub const DEPLOYMENT_MESSAGE: &str = "DEPLOYMENT_MESSAGE";

const KNOWN_KEYS: &[&str] = &[
    QUEUE_TIMEOUT_IN_SECS,
    DEPLOYMENT_TIMEOUT_IN_SECS,
    SLEEP_PERIOD_IN_SECS,
    REDEPLOY_OUTDATED_APPS,
    ALLOW_CONTINUE_WITH_ERRORS,
    SSL_CERT_VERIFY,
    MAX_VERSIONS_TO_RETURN,
    TAG_APP_MAX_RETRIES,
    DEPLOYMENT_MESSAGE,
];

/// One day; the upper bound for any timeout or sleep period.
const MAX_SECS: u64 = 86_400;

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {}", join_errors(.0))]
    Invalid(Vec<EnvError>),

    #[error("Missing {0}")]
    MissingConnection(String),
}

impl ConfigError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::ConfigFileNotFound,
            Self::Read { .. } => ErrorCode::ConfigReadError,
            Self::Parse { .. } => ErrorCode::ConfigParseError,
            Self::Invalid(_) => ErrorCode::ConfigEnvError,
            Self::MissingConnection(_) => ErrorCode::ConfigMissingConnection,
        }
    }
}

fn join_errors(errors: &[EnvError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Tunables for the deployment pipeline steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Max wait for other plans on the target environment to finish.
    pub queue_timeout_secs: u64,
    /// Max wait for a started plan to finish.
    pub deployment_timeout_secs: u64,
    /// Interval between status polls.
    pub sleep_period_secs: u64,
    /// Redeploy outdated consumers of the deployed applications.
    pub redeploy_outdated_apps: bool,
    /// Start plans with conflicts instead of deleting them (API v2 only).
    pub allow_continue_with_errors: bool,
    /// Verify TLS certificates of the LifeTime host.
    pub ssl_cert_verify: bool,
    /// Tag history read when picking the next free version number.
    pub max_versions_to_return: u32,
    /// Candidate version numbers tried before giving up on tagging an application.
    pub tag_app_max_retries: u32,
    /// Notes used when the manifest has none.
    pub deployment_note: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_timeout_secs: 1800,
            deployment_timeout_secs: 3600,
            sleep_period_secs: 20,
            redeploy_outdated_apps: true,
            allow_continue_with_errors: false,
            ssl_cert_verify: true,
            max_versions_to_return: 10,
            tag_app_max_retries: 5,
            deployment_note: DEFAULT_DEPLOYMENT_MESSAGE.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_timeout_secs)
    }

    pub fn deployment_timeout(&self) -> Duration {
        Duration::from_secs(self.deployment_timeout_secs)
    }

    pub fn sleep_period(&self) -> Duration {
        Duration::from_secs(self.sleep_period_secs)
    }

    /// Resolve from an optional config file and the process environment.
    pub fn load(config_file: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
        let file_layer = match config_file {
            Some(path) => {
                let values = load_config_file(path)?;
                for key in unknown_keys(&values) {
                    debug!(%key, path = %path.display(), "ignoring unknown config key");
                }
                Some(EnvParser::from_file(path.to_path_buf(), values))
            }
            None => None,
        };
        Self::resolve(
            file_layer,
            vec![EnvParser::new("ENV_"), EnvParser::new("LTD_")],
        )
    }

    /// Resolve from explicit layers, lowest to highest precedence after
    /// the file.
    pub fn resolve(
        file_layer: Option<EnvParser>,
        env_layers: Vec<EnvParser>,
    ) -> Result<LoadedConfig, ConfigError> {
        let mut sourced = SourcedConfig::defaults();
        let mut errors = Vec::new();

        for mut layer in file_layer.into_iter().chain(env_layers) {
            sourced = sourced.apply(&mut layer);
            errors.extend(layer.take_errors());
        }

        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors));
        }

        let loaded = sourced.finish();
        for warning in &loaded.warnings {
            debug!(%warning, "config warning");
        }
        Ok(loaded)
    }
}

/// Warn about file keys that no setting reads.
pub fn unknown_keys(values: &BTreeMap<String, String>) -> Vec<String> {
    values
        .keys()
        .filter(|key| !KNOWN_KEYS.contains(&key.as_str()))
        .cloned()
        .collect()
}

/// Resolved configuration plus per-key provenance.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: PipelineConfig,
    pub sources: BTreeMap<&'static str, ConfigSource>,
    pub warnings: Vec<String>,
}

struct SourcedConfig {
    queue_timeout: Sourced<u64>,
    deployment_timeout: Sourced<u64>,
    sleep_period: Sourced<u64>,
    redeploy_outdated: Sourced<bool>,
    allow_continue_with_errors: Sourced<bool>,
    ssl_cert_verify: Sourced<bool>,
    max_versions: Sourced<u32>,
    tag_retries: Sourced<u32>,
    deployment_note: Sourced<String>,
}

impl SourcedConfig {
    fn defaults() -> Self {
        let d = PipelineConfig::default();
        Self {
            queue_timeout: Sourced::default_value(d.queue_timeout_secs),
            deployment_timeout: Sourced::default_value(d.deployment_timeout_secs),
            sleep_period: Sourced::default_value(d.sleep_period_secs),
            redeploy_outdated: Sourced::default_value(d.redeploy_outdated_apps),
            allow_continue_with_errors: Sourced::default_value(d.allow_continue_with_errors),
            ssl_cert_verify: Sourced::default_value(d.ssl_cert_verify),
            max_versions: Sourced::default_value(d.max_versions_to_return),
            tag_retries: Sourced::default_value(d.tag_app_max_retries),
            deployment_note: Sourced::default_value(d.deployment_note),
        }
    }

    fn apply(self, p: &mut EnvParser) -> Self {
        Self {
            queue_timeout: p.get_u64_range(QUEUE_TIMEOUT_IN_SECS, self.queue_timeout, 0, MAX_SECS),
            deployment_timeout: p.get_u64_range(
                DEPLOYMENT_TIMEOUT_IN_SECS,
                self.deployment_timeout,
                0,
                MAX_SECS,
            ),
            sleep_period: p.get_u64_range(SLEEP_PERIOD_IN_SECS, self.sleep_period, 1, MAX_SECS),
            redeploy_outdated: p.get_bool(REDEPLOY_OUTDATED_APPS, self.redeploy_outdated),
            allow_continue_with_errors: p
                .get_bool(ALLOW_CONTINUE_WITH_ERRORS, self.allow_continue_with_errors),
            ssl_cert_verify: p.get_bool(SSL_CERT_VERIFY, self.ssl_cert_verify),
            max_versions: p.get_u32_range(MAX_VERSIONS_TO_RETURN, self.max_versions, 1, 1000),
            tag_retries: p.get_u32_range(TAG_APP_MAX_RETRIES, self.tag_retries, 1, 100),
            deployment_note: p.get_string(DEPLOYMENT_MESSAGE, self.deployment_note),
        }
    }

    fn finish(self) -> LoadedConfig {
        let mut sources = BTreeMap::new();
        sources.insert(QUEUE_TIMEOUT_IN_SECS, self.queue_timeout.source);
        sources.insert(DEPLOYMENT_TIMEOUT_IN_SECS, self.deployment_timeout.source);
        sources.insert(SLEEP_PERIOD_IN_SECS, self.sleep_period.source);
        sources.insert(REDEPLOY_OUTDATED_APPS, self.redeploy_outdated.source);
        sources.insert(ALLOW_CONTINUE_WITH_ERRORS, self.allow_continue_with_errors.source);
        sources.insert(SSL_CERT_VERIFY, self.ssl_cert_verify.source);
        sources.insert(MAX_VERSIONS_TO_RETURN, self.max_versions.source);
        sources.insert(TAG_APP_MAX_RETRIES, self.tag_retries.source);
        sources.insert(DEPLOYMENT_MESSAGE, self.deployment_note.source);

        let config = PipelineConfig {
            queue_timeout_secs: self.queue_timeout.value,
            deployment_timeout_secs: self.deployment_timeout.value,
            sleep_period_secs: self.sleep_period.value,
            redeploy_outdated_apps: self.redeploy_outdated.value,
            allow_continue_with_errors: self.allow_continue_with_errors.value,
            ssl_cert_verify: self.ssl_cert_verify.value,
            max_versions_to_return: self.max_versions.value,
            tag_app_max_retries: self.tag_retries.value,
            deployment_note: self.deployment_note.value,
        };
        let warnings = validate(&config);

        LoadedConfig {
            config,
            sources,
            warnings,
        }
    }
}

fn validate(config: &PipelineConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if config.deployment_timeout_secs < config.sleep_period_secs {
        warnings.push(format!(
            "{DEPLOYMENT_TIMEOUT_IN_SECS} ({}) is shorter than {SLEEP_PERIOD_IN_SECS} ({}); \
             the plan is polled once",
            config.deployment_timeout_secs, config.sleep_period_secs
        ));
    }
    if config.queue_timeout_secs < config.sleep_period_secs {
        warnings.push(format!(
            "{QUEUE_TIMEOUT_IN_SECS} ({}) is shorter than {SLEEP_PERIOD_IN_SECS} ({}); \
             a busy queue fails immediately",
            config.queue_timeout_secs, config.sleep_period_secs
        ));
    }
    warnings
}
