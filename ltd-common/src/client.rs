//! Async HTTP client for the LifeTime REST API.
//!
//! Responses are reduced to an [`ApiResponse`] (status + JSON body) and
//! then run through a per-endpoint [`StatusTable`], which maps each
//! documented status code to success or to a typed [`LifetimeError`].

use crate::endpoint::{ApiVersion, LifetimeEndpoint};
use crate::errors::{LifetimeError, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Per-request timeout; long enough for package uploads.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Status code and decoded body of one API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

/// Error class an endpoint maps a status code to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AppDoesNotExist,
    EnvironmentNotFound,
    NotEnoughPermissions,
    InvalidParameters,
    ServerError,
    NoDeployments,
    ImpossibleAction,
    NoAppsAvailable,
    AppVersions,
}

impl ErrorKind {
    const fn phrase(self) -> &'static str {
        match self {
            Self::AppDoesNotExist => "the application does not exist",
            Self::EnvironmentNotFound => "the environment was not found",
            Self::NotEnoughPermissions => "you don't have enough permissions",
            Self::InvalidParameters => "the request is invalid",
            Self::ServerError => "the server failed to process the request",
            Self::NoDeployments => "no deployment matches the request",
            Self::ImpossibleAction => "the action is not possible in the current deployment state",
            Self::NoAppsAvailable => "no applications are available in the infrastructure",
            Self::AppVersions => "the application versions could not be listed",
        }
    }

    fn into_error(self, message: String) -> LifetimeError {
        match self {
            Self::AppDoesNotExist => LifetimeError::AppDoesNotExist(message),
            Self::EnvironmentNotFound => LifetimeError::EnvironmentNotFound(message),
            Self::NotEnoughPermissions => LifetimeError::NotEnoughPermissions(message),
            Self::InvalidParameters => LifetimeError::InvalidParameters(message),
            Self::ServerError => LifetimeError::ServerError(message),
            Self::NoDeployments => LifetimeError::NoDeployments(message),
            Self::ImpossibleAction => LifetimeError::ImpossibleApplyActionDeployment(message),
            Self::NoAppsAvailable => LifetimeError::NoAppsAvailable(message),
            Self::AppVersions => LifetimeError::AppVersions(message),
        }
    }
}

/// What a status code means for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Body carries the result.
    Success,
    /// Success with nothing to return.
    Empty,
    Fail(ErrorKind),
}

/// Declarative status-code dispatch for one endpoint.
#[derive(Debug, Clone, Copy)]
pub struct StatusTable {
    action: &'static str,
    entries: &'static [(u16, Outcome)],
}

impl StatusTable {
    pub const fn new(action: &'static str, entries: &'static [(u16, Outcome)]) -> Self {
        Self { action, entries }
    }

    pub fn outcome(&self, status: u16) -> Option<Outcome> {
        self.entries
            .iter()
            .find(|(code, _)| *code == status)
            .map(|(_, outcome)| *outcome)
    }

    /// Returns `Some(body)` on success, `None` for an empty success.
    pub fn dispatch(&self, response: ApiResponse, subject: &str) -> Result<Option<Value>> {
        let target = if subject.is_empty() {
            self.action.to_string()
        } else {
            format!("{} {}", self.action, subject)
        };
        match self.outcome(response.status) {
            Some(Outcome::Success) => Ok(Some(response.body)),
            Some(Outcome::Empty) => Ok(None),
            Some(Outcome::Fail(kind)) => Err(kind.into_error(format!(
                "Failed to {target}: {}. Details: {}",
                kind.phrase(),
                response.body
            ))),
            None => Err(LifetimeError::UnexpectedStatus {
                status: response.status,
                context: target,
                detail: response.body.to_string(),
            }),
        }
    }

    /// Like [`dispatch`](Self::dispatch) but treats an empty success as `{}`.
    pub fn expect(&self, response: ApiResponse, subject: &str) -> Result<Value> {
        Ok(self
            .dispatch(response, subject)?
            .unwrap_or_else(|| Value::Object(Default::default())))
    }
}

/// Authenticated client bound to one REST endpoint.
#[derive(Debug, Clone)]
pub struct LifetimeClient {
    http: reqwest::Client,
    endpoint: LifetimeEndpoint,
}

impl LifetimeClient {
    /// Client sending `authorization: Bearer <token>` on every request.
    pub fn new(endpoint: LifetimeEndpoint, token: &str, ssl_cert_verify: bool) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            LifetimeError::InvalidParameters("The API token contains invalid characters".into())
        })?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        Self::with_headers(endpoint, headers, ssl_cert_verify)
    }

    /// Client with arbitrary default headers (the CI/CD probe uses an API key).
    pub fn with_headers(
        endpoint: LifetimeEndpoint,
        mut headers: HeaderMap,
        ssl_cert_verify: bool,
    ) -> Result<Self> {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(!ssl_cert_verify)
            .build()
            .map_err(|source| LifetimeError::Transport {
                url: endpoint.base(),
                source,
            })?;
        Ok(Self { http, endpoint })
    }

    /// Header helper for API-key style authentication.
    pub fn api_key_header(name: &'static str, key: &str) -> Result<HeaderMap> {
        let mut value = HeaderValue::from_str(key).map_err(|_| {
            LifetimeError::InvalidParameters("The API key contains invalid characters".into())
        })?;
        value.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(name), value);
        Ok(headers)
    }

    pub fn endpoint(&self) -> &LifetimeEndpoint {
        &self.endpoint
    }

    pub fn api_version(&self) -> Result<ApiVersion> {
        ApiVersion::try_from(self.endpoint.version)
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<ApiResponse> {
        let url = self.endpoint.url(path);
        debug!(%url, "GET");
        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|source| transport(&url, source))?;
        strict_json("GET", url, response).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        let url = self.endpoint.url(path);
        debug!(%url, "DELETE");
        let response = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(|source| transport(&url, source))?;
        strict_json("DELETE", url, response).await
    }

    /// POST with an optional JSON body.
    ///
    /// LifeTime answers some POSTs with plain text (the new deployment
    /// key); such bodies come back as a JSON string.
    pub async fn post(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let url = self.endpoint.url(path);
        debug!(%url, "POST");
        let mut request = self.http.post(&url).query(query);
        if let Some(body) = body {
            request = request.body(body.to_string());
        }
        let response = request
            .send()
            .await
            .map_err(|source| transport(&url, source))?;
        lenient_json(&url, response).await
    }

    /// POST raw bytes as `application/octet-stream`.
    pub async fn post_binary(&self, path: &str, bytes: Vec<u8>) -> Result<ApiResponse> {
        let url = self.endpoint.url(path);
        debug!(%url, size = bytes.len(), "POST binary");
        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|source| transport(&url, source))?;
        lenient_json(&url, response).await
    }

    /// GET an absolute URL (package download links) and return raw bytes.
    pub async fn download(&self, url: &str) -> Result<(u16, Vec<u8>)> {
        debug!(%url, "GET download");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| transport(url, source))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|source| transport(url, source))?;
        Ok((status, bytes.to_vec()))
    }
}

fn transport(url: &str, source: reqwest::Error) -> LifetimeError {
    LifetimeError::Transport {
        url: url.to_string(),
        source,
    }
}

async fn read_text(url: &str, response: reqwest::Response) -> Result<(u16, String)> {
    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|source| transport(url, source))?;
    Ok((status, text))
}

async fn strict_json(
    method: &'static str,
    url: String,
    response: reqwest::Response,
) -> Result<ApiResponse> {
    let (status, text) = read_text(&url, response).await?;
    let body = parse_strict(&text).ok_or_else(|| LifetimeError::InvalidJsonResponse {
        method,
        url,
        body: text.clone(),
    })?;
    Ok(ApiResponse { status, body })
}

async fn lenient_json(url: &str, response: reqwest::Response) -> Result<ApiResponse> {
    let (status, text) = read_text(url, response).await?;
    Ok(ApiResponse {
        status,
        body: parse_lenient(&text),
    })
}

fn parse_strict(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return Some(Value::Object(Default::default()));
    }
    serde_json::from_str(text).ok()
}

fn parse_lenient(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(text)
        .unwrap_or_else(|_| Value::String(text.trim().trim_matches('"').to_string()))
}

/// Render a query flag the way LifeTime expects it.
pub(crate) fn flag(value: bool) -> String {
    value.to_string()
}
