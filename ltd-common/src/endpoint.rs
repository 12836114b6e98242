//! LifeTime and CI/CD probe base URLs.

use crate::errors::{LifetimeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_LT_API_ENDPOINT: &str = "lifetimeapi/rest";
pub const DEFAULT_PROBE_API_ENDPOINT: &str = "CI_CDProbe/rest/api";
pub const DEFAULT_PROBE_API_VERSION: u8 = 1;

/// LifeTime REST API generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiVersion {
    /// Platform versions below 11.
    V1,
    /// Platform 11 and above.
    V2,
}

impl ApiVersion {
    pub const fn number(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }
}

impl TryFrom<u8> for ApiVersion {
    type Error = LifetimeError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(LifetimeError::UnsupportedApiVersion(other)),
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.number())
    }
}

/// Protocol, host and API path of a REST service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifetimeEndpoint {
    pub proto: &'static str,
    pub host: String,
    pub api_endpoint: String,
    pub version: u8,
}

impl LifetimeEndpoint {
    /// Split a user-supplied URL into protocol and host.
    ///
    /// `http://` selects plain HTTP; anything else defaults to HTTPS.
    pub fn parse(url: &str, api_endpoint: &str, version: u8) -> Self {
        let url = url.trim();
        let (proto, rest) = match url.strip_prefix("http://") {
            Some(rest) => ("http", rest),
            None => ("https", url.strip_prefix("https://").unwrap_or(url)),
        };
        let host = rest.strip_suffix('/').unwrap_or(rest);
        Self {
            proto,
            host: host.to_string(),
            api_endpoint: api_endpoint.trim_matches('/').to_string(),
            version,
        }
    }

    /// `{proto}://{host}/{api_endpoint}/v{version}`
    pub fn base(&self) -> String {
        format!(
            "{}://{}/{}/v{}",
            self.proto, self.host, self.api_endpoint, self.version
        )
    }

    /// Full URL for a path relative to the base.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base(), path.trim_start_matches('/'))
    }
}

impl fmt::Display for LifetimeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base())
    }
}
