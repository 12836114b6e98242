//! Error catalog and the library error type.
//!
//! # Error Code Ranges
//!
//! | Range      | Category    | Description                               |
//! |------------|-------------|-------------------------------------------|
//! | E001-E099  | Config      | Config file and environment overrides     |
//! | E100-E199  | Api         | HTTP transport and LifeTime responses     |
//! | E200-E299  | Lookup      | Applications, environments and manifests  |
//! | E300-E399  | Deployment  | Deployment plan lifecycle                 |
//! | E400-E499  | Package     | OSP/OAP packages and deployment order     |
//! | E500-E599  | Internal    | Artifact cache and unexpected errors      |

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};

use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Library result alias.
pub type Result<T> = std::result::Result<T, LifetimeError>;

/// Failures raised by LifeTime API calls, lookups and pipeline steps.
#[derive(Debug, Error)]
pub enum LifetimeError {
    #[error("{0}")]
    AppDoesNotExist(String),

    #[error("{0}")]
    EnvironmentNotFound(String),

    #[error("{0}")]
    NotEnoughPermissions(String),

    #[error("{0}")]
    InvalidParameters(String),

    #[error("{0}")]
    ServerError(String),

    #[error("{0}")]
    NoDeployments(String),

    #[error("{0}")]
    ImpossibleApplyActionDeployment(String),

    #[error("{0}")]
    NoAppsAvailable(String),

    #[error("{0}")]
    AppVersions(String),

    #[error("{method} {url}: The JSON response could not be parsed. Response: {body}")]
    InvalidJsonResponse {
        method: &'static str,
        url: String,
        body: String,
    },

    #[error("{0}")]
    ManifestDoesNotExist(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("{0}")]
    InvalidOutSystemsPackage(String),

    #[error("Failed to download the package from {url}: {source}")]
    PackageDownload {
        url: String,
        #[source]
        source: Box<LifetimeError>,
    },

    #[error("There are circular dependencies among the list of applications: {}", .0.join(", "))]
    CircularDependency(Vec<String>),

    #[error(
        "There was an error while trying to {context}. HTTP {status}. \
         Response from server: {detail}"
    )]
    UnexpectedStatus {
        status: u16,
        context: String,
        detail: String,
    },

    #[error("Unsupported API version for LifeTime: used {0}")]
    UnsupportedApiVersion(u8),

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("The file with filename {} does not exist.", .path.display())]
    CacheMiss { path: PathBuf },

    #[error("Invalid JSON in cache file {}: {source}", .path.display())]
    CacheJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

impl LifetimeError {
    /// Catalog code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AppDoesNotExist(_) => ErrorCode::LookupAppDoesNotExist,
            Self::EnvironmentNotFound(_) => ErrorCode::LookupEnvironmentNotFound,
            Self::NotEnoughPermissions(_) => ErrorCode::ApiNotEnoughPermissions,
            Self::InvalidParameters(_) => ErrorCode::ApiInvalidParameters,
            Self::ServerError(_) => ErrorCode::ApiServerError,
            Self::NoDeployments(_) => ErrorCode::DeploymentNotFound,
            Self::ImpossibleApplyActionDeployment(_) => ErrorCode::DeploymentImpossibleAction,
            Self::NoAppsAvailable(_) => ErrorCode::LookupNoAppsAvailable,
            Self::AppVersions(_) => ErrorCode::LookupAppVersions,
            Self::InvalidJsonResponse { .. } => ErrorCode::ApiInvalidJsonResponse,
            Self::ManifestDoesNotExist(_) => ErrorCode::LookupManifestDoesNotExist,
            Self::InvalidManifest(_) => ErrorCode::LookupManifestInvalid,
            Self::InvalidOutSystemsPackage(_) => ErrorCode::PackageInvalid,
            Self::PackageDownload { .. } => ErrorCode::PackageDownloadFailed,
            Self::CircularDependency(_) => ErrorCode::PackageCircularDependency,
            Self::UnexpectedStatus { .. } => ErrorCode::ApiUnexpectedStatus,
            Self::UnsupportedApiVersion(_) => ErrorCode::ApiUnsupportedVersion,
            Self::Transport { .. } => ErrorCode::ApiTransportFailed,
            Self::CacheMiss { .. } | Self::CacheJson { .. } => ErrorCode::InternalCacheError,
            Self::Io { .. } => ErrorCode::InternalIoError,
            Self::Config(err) => err.code(),
            Self::Logging(_) => ErrorCode::InternalLoggingError,
        }
    }

    /// True for a cache file that was never written.
    #[must_use]
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Self::CacheMiss { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
