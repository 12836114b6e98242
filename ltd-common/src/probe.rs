//! CI/CD probe client: producer applications of an application version.

use crate::cache::{ArtifactStore, CacheFile};
use crate::client::{LifetimeClient, Outcome, StatusTable};
use crate::endpoint::LifetimeEndpoint;
use crate::errors::Result;
use crate::lifetime::decode;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::debug;

/// Header carrying the optional probe API key.
pub const PROBE_KEY_HEADER: &str = "x-cicdprobe-key";

const DEPENDENCIES: StatusTable =
    StatusTable::new("get the dependencies of application", &[(200, Outcome::Success)]);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Dependency {
    application_key: String,
}

#[derive(Debug, Clone)]
pub struct ProbeClient {
    client: LifetimeClient,
    store: ArtifactStore,
}

impl ProbeClient {
    pub fn new(
        endpoint: LifetimeEndpoint,
        api_key: Option<&str>,
        ssl_cert_verify: bool,
        store: ArtifactStore,
    ) -> Result<Self> {
        let headers = match api_key {
            Some(key) => LifetimeClient::api_key_header(PROBE_KEY_HEADER, key)?,
            None => HeaderMap::new(),
        };
        Ok(Self {
            client: LifetimeClient::with_headers(endpoint, headers, ssl_cert_verify)?,
            store,
        })
    }

    /// Keys of the applications `name` (at `version`) consumes from.
    pub async fn get_app_dependencies(
        &self,
        name: &str,
        version: &str,
    ) -> Result<BTreeSet<String>> {
        let query = [
            ("ApplicationName", name.to_string()),
            ("ApplicationVersion", version.to_string()),
        ];
        let response = self.client.get("GetApplicationDependencies", &query).await?;
        let body = DEPENDENCIES.expect(response, &format!("{name} ({version})"))?;
        self.store
            .store(&CacheFile::probe_dependencies(name), &body)?;
        let dependencies: Vec<Dependency> = decode(body, "GetApplicationDependencies")?;
        let keys: BTreeSet<String> = dependencies
            .into_iter()
            .map(|dep| dep.application_key)
            .collect();
        debug!(app = name, producers = keys.len(), "application dependencies");
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiResponse;
    use crate::errors::LifetimeError;
    use serde_json::json;

    #[test]
    fn test_only_ok_is_accepted() {
        let err = DEPENDENCIES
            .dispatch(ApiResponse { status: 404, body: json!({}) }, "Portal (1.0)")
            .unwrap_err();
        assert!(matches!(err, LifetimeError::UnexpectedStatus { status: 404, .. }));
    }

    #[test]
    fn test_dependency_payload() {
        let payload = json!([{"ApplicationKey": "a"}, {"ApplicationKey": "b"}]);
        let deps: Vec<Dependency> = serde_json::from_value(payload).unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[1].application_key, "b");
    }
}
