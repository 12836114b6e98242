//! Error Catalog for LifeTime Deploy
//!
//! Every failure a pipeline step can report has a unique code
//! (LTD-E001 through LTD-E599), a message and remediation steps so that
//! build logs point at a fix instead of a stack trace.
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

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code enumeration covering all LifeTime Deploy failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // =========================================================================
    // Config Errors (E001-E099)
    // =========================================================================
    /// Config file passed on the command line does not exist
    ConfigFileNotFound,
    /// Config file could not be read
    ConfigReadError,
    /// Config file is not valid TOML or dotenv
    ConfigParseError,
    /// Environment override has an invalid value
    ConfigEnvError,
    /// Resolved configuration is inconsistent
    ConfigValidationError,
    /// LifeTime URL or token missing
    ConfigMissingConnection,

    // =========================================================================
    // Api Errors (E100-E199)
    // =========================================================================
    /// HTTP request could not be sent or completed
    ApiTransportFailed,
    /// Response body was not JSON
    ApiInvalidJsonResponse,
    /// Status code not documented for the endpoint
    ApiUnexpectedStatus,
    /// Token lacks permissions for the operation
    ApiNotEnoughPermissions,
    /// Request parameters rejected
    ApiInvalidParameters,
    /// LifeTime reported an internal failure
    ApiServerError,
    /// API version is neither 1 nor 2
    ApiUnsupportedVersion,

    // =========================================================================
    // Lookup Errors (E200-E299)
    // =========================================================================
    /// Application not found
    LookupAppDoesNotExist,
    /// Environment not found
    LookupEnvironmentNotFound,
    /// Infrastructure has no applications
    LookupNoAppsAvailable,
    /// Application versions could not be listed
    LookupAppVersions,
    /// No manifest was supplied or found
    LookupManifestDoesNotExist,
    /// Manifest JSON does not match the expected shape
    LookupManifestInvalid,

    // =========================================================================
    // Deployment Errors (E300-E399)
    // =========================================================================
    /// Deployment plan not found
    DeploymentNotFound,
    /// Action not allowed in the plan's current state
    DeploymentImpossibleAction,
    /// Plan has application conflicts and was deleted
    DeploymentConflicts,
    /// Plan finished with errors or was aborted
    DeploymentFailed,
    /// Plan still running when the deployment timeout elapsed
    DeploymentTimedOut,
    /// Another plan kept the target environment busy
    DeploymentQueueTimedOut,
    /// Running plan is not waiting on a two-step continue
    DeploymentNotPrepared,

    // =========================================================================
    // Package Errors (E400-E499)
    // =========================================================================
    /// File is not an OutSystems package
    PackageInvalid,
    /// Package download failed
    PackageDownloadFailed,
    /// Application dependencies form a cycle
    PackageCircularDependency,

    // =========================================================================
    // Internal Errors (E500-E599)
    // =========================================================================
    /// Artifact cache read or write failed
    InternalCacheError,
    /// Filesystem error outside the cache
    InternalIoError,
    /// Logging system error
    InternalLoggingError,
}

impl ErrorCode {
    /// Returns the numeric error code (without prefix).
    #[must_use]
    pub const fn code_number(&self) -> u16 {
        match self {
            // Config (001-099)
            Self::ConfigFileNotFound => 1,
            Self::ConfigReadError => 2,
            Self::ConfigParseError => 3,
            Self::ConfigEnvError => 4,
            Self::ConfigValidationError => 5,
            Self::ConfigMissingConnection => 6,

            // Api (100-199)
            Self::ApiTransportFailed => 100,
            Self::ApiInvalidJsonResponse => 101,
            Self::ApiUnexpectedStatus => 102,
            Self::ApiNotEnoughPermissions => 103,
            Self::ApiInvalidParameters => 104,
            Self::ApiServerError => 105,
            Self::ApiUnsupportedVersion => 106,

            // Lookup (200-299)
            Self::LookupAppDoesNotExist => 200,
            Self::LookupEnvironmentNotFound => 201,
            Self::LookupNoAppsAvailable => 202,
            Self::LookupAppVersions => 203,
            Self::LookupManifestDoesNotExist => 204,
            Self::LookupManifestInvalid => 205,

            // Deployment (300-399)
            Self::DeploymentNotFound => 300,
            Self::DeploymentImpossibleAction => 301,
            Self::DeploymentConflicts => 302,
            Self::DeploymentFailed => 303,
            Self::DeploymentTimedOut => 304,
            Self::DeploymentQueueTimedOut => 305,
            Self::DeploymentNotPrepared => 306,

            // Package (400-499)
            Self::PackageInvalid => 400,
            Self::PackageDownloadFailed => 401,
            Self::PackageCircularDependency => 402,

            // Internal (500-599)
            Self::InternalCacheError => 500,
            Self::InternalIoError => 501,
            Self::InternalLoggingError => 502,
        }
    }

    /// Returns the formatted error code string (e.g., "LTD-E001").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("LTD-E{:03}", self.code_number())
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self.code_number() {
            1..=99 => ErrorCategory::Config,
            100..=199 => ErrorCategory::Api,
            200..=299 => ErrorCategory::Lookup,
            300..=399 => ErrorCategory::Deployment,
            400..=499 => ErrorCategory::Package,
            _ => ErrorCategory::Internal,
        }
    }

    /// Returns the full error entry with all metadata.
    #[must_use]
    pub fn entry(&self) -> ErrorEntry {
        ErrorEntry {
            code: self.code_string(),
            category: self.category(),
            message: self.message().to_string(),
            remediation: self
                .remediation()
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    /// Returns the error message template.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ConfigFileNotFound => "Configuration file not found",
            Self::ConfigReadError => "Failed to read configuration file",
            Self::ConfigParseError => "Configuration file contains invalid syntax",
            Self::ConfigEnvError => "Environment override has an invalid value",
            Self::ConfigValidationError => "Configuration contains inconsistent values",
            Self::ConfigMissingConnection => "LifeTime URL or API token not provided",

            Self::ApiTransportFailed => "Request to the LifeTime API failed",
            Self::ApiInvalidJsonResponse => "The JSON response could not be parsed",
            Self::ApiUnexpectedStatus => "LifeTime returned an undocumented status code",
            Self::ApiNotEnoughPermissions => "Not enough permissions for the requested operation",
            Self::ApiInvalidParameters => "The request parameters are invalid",
            Self::ApiServerError => "LifeTime failed to process the request",
            Self::ApiUnsupportedVersion => "Unsupported LifeTime API version",

            Self::LookupAppDoesNotExist => "Application does not exist",
            Self::LookupEnvironmentNotFound => "Environment not found",
            Self::LookupNoAppsAvailable => "No applications available in the infrastructure",
            Self::LookupAppVersions => "Failed to list the application versions",
            Self::LookupManifestDoesNotExist => "No manifest was provided",
            Self::LookupManifestInvalid => "Manifest is not valid",

            Self::DeploymentNotFound => "Deployment plan not found",
            Self::DeploymentImpossibleAction => "Action not allowed for the deployment plan",
            Self::DeploymentConflicts => "Deployment plan has conflicts and was not run",
            Self::DeploymentFailed => "Deployment plan finished with errors",
            Self::DeploymentTimedOut => "Deployment plan did not finish before the timeout",
            Self::DeploymentQueueTimedOut => "Timed out waiting for LifeTime to be free",
            Self::DeploymentNotPrepared => "Deployment plan is not in 'Prepared' status",

            Self::PackageInvalid => "Binary file is not an OutSystems package",
            Self::PackageDownloadFailed => "Failed to download the application package",
            Self::PackageCircularDependency => {
                "There are circular dependencies among the list of applications"
            }

            Self::InternalCacheError => "Artifact cache operation failed",
            Self::InternalIoError => "Filesystem operation failed",
            Self::InternalLoggingError => "Logging system could not be initialized",
        }
    }

    /// Returns remediation steps for this error.
    #[must_use]
    pub const fn remediation(&self) -> &'static [&'static str] {
        match self {
            Self::ConfigFileNotFound => &[
                "Check the path passed to --config-file",
                "Paths are resolved relative to the working directory",
            ],
            Self::ConfigReadError => &["Check file permissions on the config file"],
            Self::ConfigParseError => &[
                "Files ending in .toml must be valid TOML",
                "Other files use KEY=VALUE lines; comments start with '#'",
            ],
            Self::ConfigEnvError => &[
                "Check LTD_* variables for typos",
                "Numbers must be unsigned integers, booleans true/false",
            ],
            Self::ConfigValidationError => &[
                "SLEEP_PERIOD_IN_SECS must be at least 1",
                "Timeouts should be larger than the sleep period",
            ],
            Self::ConfigMissingConnection => &[
                "Pass --lt-url and --lt-token",
                "Or export LTD_LT_URL and LTD_LT_TOKEN",
            ],

            Self::ApiTransportFailed => &[
                "Check that the LifeTime host is reachable from the build agent",
                "For self-signed certificates set ENV_SSL_CERT_VERIFY=false",
            ],
            Self::ApiInvalidJsonResponse => &[
                "Check --lt-endpoint points at the REST API (default lifetimeapi/rest)",
                "A proxy or login page may be answering instead of LifeTime",
            ],
            Self::ApiUnexpectedStatus => &[
                "Check --lt-api-version matches the platform version",
                "Run with --verbose to see the full response",
            ],
            Self::ApiNotEnoughPermissions => &[
                "Grant the service account the required LifeTime role",
                "Regenerate the token if it was revoked",
            ],
            Self::ApiInvalidParameters => &["Run with --verbose to see the request sent"],
            Self::ApiServerError => &[
                "Check the LifeTime service center logs",
                "Retry the pipeline step",
            ],
            Self::ApiUnsupportedVersion => &[
                "Use --lt-api-version 1 for platform versions below 11",
                "Use --lt-api-version 2 for platform 11 and above",
            ],

            Self::LookupAppDoesNotExist => &[
                "Check the application name (names are case-sensitive)",
                "Run fetch-lifetime-data to refresh the cache",
            ],
            Self::LookupEnvironmentNotFound => &[
                "Check the environment name or manifest label",
                "Delete the Artifacts folder to clear a stale cache",
            ],
            Self::LookupNoAppsAvailable => &["Check the token can see the infrastructure"],
            Self::LookupAppVersions => &["Check the application has tagged versions"],
            Self::LookupManifestDoesNotExist => &[
                "Pass --trigger-manifest with inline JSON",
                "Or pass --manifest-file with a path",
            ],
            Self::LookupManifestInvalid => &["Run `ltd manifest schema` to see the expected shape"],

            Self::DeploymentNotFound => &["Check the deployment plan key"],
            Self::DeploymentImpossibleAction => &[
                "Only saved plans can be deleted; abort the plan first",
                "Only prepared plans can be continued",
            ],
            Self::DeploymentConflicts => &[
                "Inspect the DeploymentConflicts artifact",
                "Set ALLOW_CONTINUE_WITH_ERRORS=true to deploy anyway (API v2 only)",
            ],
            Self::DeploymentFailed => &["Inspect the DeploymentErrors artifact"],
            Self::DeploymentTimedOut => &[
                "Check the plan in LifeTime",
                "Increase DEPLOYMENT_TIMEOUT_IN_SECS",
            ],
            Self::DeploymentQueueTimedOut => &[
                "Check for stuck plans on the target environment",
                "Increase QUEUE_TIMEOUT_IN_SECS or pass --allow-parallel",
            ],
            Self::DeploymentNotPrepared => &[
                "Run continue-deployment only after a two-step first stage",
            ],

            Self::PackageInvalid => &["Use a file with an .osp or .oap extension"],
            Self::PackageDownloadFailed => &["Retry the export; download links expire"],
            Self::PackageCircularDependency => &[
                "Inspect cicd_probe_data for the dependency lists",
                "Deploy the cycle members together in one plan",
            ],

            Self::InternalCacheError => &[
                "Check the artifact directory is writable",
                "Delete the artifact directory to discard a corrupted cache",
            ],
            Self::InternalIoError => &["Check file paths and permissions"],
            Self::InternalLoggingError => &["Check LTD_LOG_FILE points at a writable path"],
        }
    }

    /// Returns all error codes for iteration.
    #[must_use]
    pub fn all() -> &'static [ErrorCode] {
        &[
            Self::ConfigFileNotFound,
            Self::ConfigReadError,
            Self::ConfigParseError,
            Self::ConfigEnvError,
            Self::ConfigValidationError,
            Self::ConfigMissingConnection,
            Self::ApiTransportFailed,
            Self::ApiInvalidJsonResponse,
            Self::ApiUnexpectedStatus,
            Self::ApiNotEnoughPermissions,
            Self::ApiInvalidParameters,
            Self::ApiServerError,
            Self::ApiUnsupportedVersion,
            Self::LookupAppDoesNotExist,
            Self::LookupEnvironmentNotFound,
            Self::LookupNoAppsAvailable,
            Self::LookupAppVersions,
            Self::LookupManifestDoesNotExist,
            Self::LookupManifestInvalid,
            Self::DeploymentNotFound,
            Self::DeploymentImpossibleAction,
            Self::DeploymentConflicts,
            Self::DeploymentFailed,
            Self::DeploymentTimedOut,
            Self::DeploymentQueueTimedOut,
            Self::DeploymentNotPrepared,
            Self::PackageInvalid,
            Self::PackageDownloadFailed,
            Self::PackageCircularDependency,
            Self::InternalCacheError,
            Self::InternalIoError,
            Self::InternalLoggingError,
        ]
    }

    /// Looks up a code by its "LTD-Exxx" string (case-insensitive).
    #[must_use]
    pub fn from_code_string(code: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|c| c.code_string().eq_ignore_ascii_case(code.trim()))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_string(), self.message())
    }
}

/// Error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Config file and environment overrides (E001-E099)
    Config,
    /// HTTP transport and LifeTime responses (E100-E199)
    Api,
    /// Applications, environments and manifests (E200-E299)
    Lookup,
    /// Deployment plan lifecycle (E300-E399)
    Deployment,
    /// Packages and deployment order (E400-E499)
    Package,
    /// Artifact cache and unexpected errors (E500-E599)
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable name for the category.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Config => "Configuration",
            Self::Api => "API",
            Self::Lookup => "Lookup",
            Self::Deployment => "Deployment",
            Self::Package => "Package",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Complete error entry with all metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Error code string (e.g., "LTD-E001")
    pub code: String,
    /// Error category
    pub category: ErrorCategory,
    /// Human-readable error message
    pub message: String,
    /// Steps to remediate the error
    pub remediation: Vec<String>,
}

impl ErrorEntry {
    /// Formats the error for display with full remediation steps.
    #[must_use]
    pub fn format_full(&self) -> String {
        let mut output = format!("[{}] {}\n", self.code, self.message);

        if !self.remediation.is_empty() {
            output.push_str("\nRemediation steps:\n");
            for (i, step) in self.remediation.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, step));
            }
        }

        output
    }

    /// Formats the error as a single line.
    #[must_use]
    pub fn format_brief(&self) -> String {
        format!("[{}] {}", self.code, self.message)
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_brief())
    }
}
