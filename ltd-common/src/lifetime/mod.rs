//! LifeTime REST API operations.
//!
//! [`Lifetime`] pairs an authenticated [`LifetimeClient`] with the
//! [`ArtifactStore`] every result is cached to. Name/key lookups read the
//! cache first; a miss against cached data clears that cache and refetches
//! once, a miss against live data is a lookup error.

pub mod applications;
pub mod deployments;
pub mod downloads;
pub mod environments;
pub mod types;

pub use applications::RunningAppVersion;
pub use deployments::StartOptions;
pub use types::*;

use crate::cache::ArtifactStore;
use crate::client::LifetimeClient;
use crate::endpoint::ApiVersion;
use crate::errors::{LifetimeError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// An application referenced either by name or by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRef<'a> {
    Name(&'a str),
    Key(&'a str),
}

/// An environment referenced either by name or by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvRef<'a> {
    Name(&'a str),
    Key(&'a str),
}

/// Resolved `(name, key)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Named {
    pub name: String,
    pub key: String,
}

/// LifeTime API bound to an artifact directory.
#[derive(Debug, Clone)]
pub struct Lifetime {
    client: LifetimeClient,
    store: ArtifactStore,
    version: ApiVersion,
}

impl Lifetime {
    pub fn new(client: LifetimeClient, store: ArtifactStore) -> Result<Self> {
        let version = client.api_version()?;
        Ok(Self {
            client,
            store,
            version,
        })
    }

    pub fn client(&self) -> &LifetimeClient {
        &self.client
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn api_version(&self) -> ApiVersion {
        self.version
    }
}

/// Decode an API body into a typed view.
pub(crate) fn decode<T: DeserializeOwned>(body: Value, what: &str) -> Result<T> {
    serde_json::from_value::<T>(body.clone()).map_err(|err| LifetimeError::InvalidJsonResponse {
        method: "GET",
        url: what.to_string(),
        body: format!("{err}: {body}"),
    })
}

/// A body that is a list, or an empty list for an empty success.
pub(crate) fn list_or_empty(body: Option<Value>) -> Value {
    match body {
        Some(Value::Array(items)) => Value::Array(items),
        Some(Value::Object(map)) if map.is_empty() => Value::Array(Vec::new()),
        Some(other) => other,
        None => Value::Array(Vec::new()),
    }
}

/// Key returned by a create call: either a bare string or an object.
pub(crate) fn returned_key(created: &Value) -> String {
    match created {
        Value::String(key) => key.clone(),
        Value::Object(map) => ["Key", "ApplicationVersionKey", "DeploymentKey"]
            .iter()
            .find_map(|field| map.get(*field).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string(),
        other => other.to_string(),
    }
}
