//! Shared helper functions for ltd commands.

use ltd_common::LifetimeError;
use ltd_common::config::ConfigError;
use ltd_common::deploy::DeployOutcome;
use ltd_common::errors::ErrorCode;
use tracing::{error, info};

/// Log a step outcome and return its exit code.
pub fn report(outcome: &DeployOutcome) -> u8 {
    match outcome.error_code() {
        None => info!(%outcome, "pipeline step finished"),
        Some(code) => error!(code = %code.code_string(), %outcome, "pipeline step failed"),
    }
    outcome.exit_code()
}

/// Catalog code of the first library error in the chain.
pub fn error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    err.chain().find_map(|cause| {
        cause
            .downcast_ref::<LifetimeError>()
            .map(LifetimeError::code)
            .or_else(|| cause.downcast_ref::<ConfigError>().map(ConfigError::code))
    })
}

/// One-line description for stderr, prefixed by the catalog code when known.
pub fn describe_error(err: &anyhow::Error) -> String {
    match error_code(err) {
        Some(code) => format!("error[{}]: {err:#}", code.code_string()),
        None => format!("error: {err:#}"),
    }
}

/// Trimmed, non-empty application names.
pub fn app_names(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
