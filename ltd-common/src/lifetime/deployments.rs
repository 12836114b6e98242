//! Deployment plans: listing, creation, execution and status.

use super::{Lifetime, decode, list_or_empty, returned_key};
use crate::cache::CacheFile;
use crate::client::{ErrorKind, Outcome, StatusTable, flag};
use crate::deploy::{DeployAppKey, DeploymentStatus};
use crate::endpoint::ApiVersion;
use crate::errors::{LifetimeError, Result};
use crate::lifetime::types::{Deployment, DeploymentInfo, DeploymentStatusReport};
use chrono::{Duration, NaiveDate, Utc};
use serde_json::{Map, Value, json};
use std::path::Path;
use tracing::{debug, info};

/// Status `Info` value signalling a prepared two-step deployment.
pub const TWO_STEP_PREPARED: &str = "deployment_prepared";

const LIST: StatusTable = StatusTable::new(
    "list the deployments",
    &[
        (200, Outcome::Success),
        (204, Outcome::Empty),
        (400, Outcome::Fail(ErrorKind::InvalidParameters)),
        (403, Outcome::Fail(ErrorKind::NotEnoughPermissions)),
        (500, Outcome::Fail(ErrorKind::ServerError)),
    ],
);

const INFO: StatusTable = StatusTable::new(
    "get the details of deployment",
    &[
        (200, Outcome::Success),
        (403, Outcome::Fail(ErrorKind::NotEnoughPermissions)),
        (404, Outcome::Fail(ErrorKind::NoDeployments)),
        (500, Outcome::Fail(ErrorKind::ServerError)),
    ],
);

const STATUS: StatusTable = StatusTable::new(
    "get the status of deployment",
    &[
        (200, Outcome::Success),
        (403, Outcome::Fail(ErrorKind::NotEnoughPermissions)),
        (404, Outcome::Fail(ErrorKind::NoDeployments)),
        (500, Outcome::Fail(ErrorKind::ServerError)),
    ],
);

const CREATE: StatusTable = StatusTable::new(
    "create the deployment",
    &[
        (200, Outcome::Success),
        (201, Outcome::Success),
        (400, Outcome::Fail(ErrorKind::InvalidParameters)),
        (403, Outcome::Fail(ErrorKind::NotEnoughPermissions)),
        (404, Outcome::Fail(ErrorKind::EnvironmentNotFound)),
        (500, Outcome::Fail(ErrorKind::ServerError)),
    ],
);

const DELETE: StatusTable = StatusTable::new(
    "delete deployment",
    &[
        (200, Outcome::Empty),
        (204, Outcome::Empty),
        (400, Outcome::Fail(ErrorKind::ImpossibleAction)),
        (403, Outcome::Fail(ErrorKind::NotEnoughPermissions)),
        (404, Outcome::Fail(ErrorKind::NoDeployments)),
        (500, Outcome::Fail(ErrorKind::ServerError)),
    ],
);

const ACTION_ENTRIES: &[(u16, Outcome)] = &[
    (200, Outcome::Empty),
    (202, Outcome::Empty),
    (400, Outcome::Fail(ErrorKind::ImpossibleAction)),
    (403, Outcome::Fail(ErrorKind::NotEnoughPermissions)),
    (404, Outcome::Fail(ErrorKind::NoDeployments)),
    (500, Outcome::Fail(ErrorKind::ServerError)),
];

const START: StatusTable = StatusTable::new("start deployment", ACTION_ENTRIES);
const CONTINUE: StatusTable = StatusTable::new("continue deployment", ACTION_ENTRIES);

/// Query flags for `deployments/{key}/start`.
///
/// Unset flags are omitted; LifeTime v1 accepts none of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartOptions {
    pub redeploy_outdated: Option<bool>,
    pub continue_with_errors: Option<bool>,
}

impl StartOptions {
    pub fn redeploy(redeploy_outdated: bool) -> Self {
        Self {
            redeploy_outdated: Some(redeploy_outdated),
            continue_with_errors: None,
        }
    }

    pub fn query(&self, version: ApiVersion) -> Vec<(&'static str, String)> {
        if version == ApiVersion::V1 {
            return Vec::new();
        }
        let mut query = Vec::new();
        if let Some(redeploy) = self.redeploy_outdated {
            query.push(("RedeployOutdated", flag(redeploy)));
        }
        if let Some(continue_with_errors) = self.continue_with_errors {
            query.push(("ContinueWithErrors", flag(continue_with_errors)));
        }
        query
    }
}

/// True when a waiting deployment finished its first (prepare) step.
pub fn check_two_step_status(status: &DeploymentStatusReport) -> bool {
    status.info.as_deref() == Some(TWO_STEP_PREPARED)
}

/// Body of `POST deployments`.
pub fn deployment_request(
    version: ApiVersion,
    app_keys: &[DeployAppKey],
    notes: &str,
    source_env_key: &str,
    target_env_key: &str,
) -> Value {
    let operations = match version {
        ApiVersion::V1 => "ApplicationVersionKeys",
        ApiVersion::V2 => "ApplicationOperations",
    };
    let mut request = Map::new();
    request.insert(operations.to_string(), json!(app_keys));
    request.insert("Notes".to_string(), json!(notes));
    request.insert("SourceEnvironmentKey".to_string(), json!(source_env_key));
    request.insert("TargetEnvironmentKey".to_string(), json!(target_env_key));
    Value::Object(request)
}

impl Lifetime {
    /// Deployments created since `since` (default: yesterday), newest first.
    pub async fn get_deployments(&self, since: Option<NaiveDate>) -> Result<Vec<Deployment>> {
        let since = since.unwrap_or_else(|| (Utc::now() - Duration::days(1)).date_naive());
        let query = [("MinDate", since.format("%Y-%m-%d").to_string())];
        let response = self.client.get("deployments", &query).await?;
        let body = list_or_empty(LIST.dispatch(response, "")?);
        self.store.store(CacheFile::DEPLOYMENTS, &body)?;
        decode(body, "deployments")
    }

    pub async fn get_deployment_info(&self, key: &str) -> Result<DeploymentInfo> {
        decode(self.get_deployment_info_raw(key).await?, key)
    }

    /// Raw deployment details, cached as `deployment_data/{key}.cache`.
    pub async fn get_deployment_info_raw(&self, key: &str) -> Result<Value> {
        let response = self.client.get(&format!("deployments/{key}"), &[]).await?;
        let body = INFO.expect(response, key)?;
        self.store.store(&CacheFile::deployment(key), &body)?;
        Ok(body)
    }

    /// Raw status payload, cached as `deployment_data/{key}.status.cache`.
    pub async fn get_deployment_status_raw(&self, key: &str) -> Result<Value> {
        let response = self
            .client
            .get(&format!("deployments/{key}/status"), &[])
            .await?;
        let body = STATUS.expect(response, key)?;
        self.store.store(&CacheFile::deployment_status(key), &body)?;
        Ok(body)
    }

    pub async fn get_deployment_status(&self, key: &str) -> Result<DeploymentStatusReport> {
        decode(self.get_deployment_status_raw(key).await?, key)
    }

    /// Active deployments (queued, running or waiting) targeting `env_key`.
    pub async fn get_running_deployment(&self, env_key: &str) -> Result<Vec<Deployment>> {
        let mut running = Vec::new();
        for deployment in self.get_deployments(None).await? {
            if deployment.target_environment_key.as_deref() != Some(env_key) {
                continue;
            }
            let status = self.get_deployment_status(&deployment.key).await?;
            let parsed = DeploymentStatus::from(status.deployment_status.as_str());
            debug!(deployment_key = %deployment.key, status = %parsed, "deployment status");
            if parsed.is_active() {
                running.push(deployment);
            }
        }
        Ok(running)
    }

    /// First plan targeting `env_key` that is saved but not started.
    pub async fn get_saved_deployment(&self, env_key: &str) -> Result<Option<Deployment>> {
        for deployment in self.get_deployments(None).await? {
            if deployment.target_environment_key.as_deref() != Some(env_key) {
                continue;
            }
            let status = self.get_deployment_status(&deployment.key).await?;
            let status = DeploymentStatus::from(status.deployment_status.as_str());
            if status == DeploymentStatus::Saved {
                return Ok(Some(deployment));
            }
        }
        Ok(None)
    }

    /// Create a plan from `src_env` to `dst_env` (environment names).
    ///
    /// The request is kept as `deployment_data/{key}.plan.cache`.
    pub async fn send_deployment(
        &self,
        app_keys: &[DeployAppKey],
        notes: &str,
        src_env: &str,
        dst_env: &str,
    ) -> Result<String> {
        let src_key = self.get_environment_key(src_env).await?;
        let dst_key = self.get_environment_key(dst_env).await?;
        let request = deployment_request(self.version, app_keys, notes, &src_key, &dst_key);
        let response = self.client.post("deployments", &[], Some(&request)).await?;
        let created = CREATE.expect(response, &format!("from {src_env} to {dst_env}"))?;
        let key = plan_key(&created)?;
        self.store.store(&CacheFile::deployment_plan(&key), &request)?;
        info!(deployment_key = %key, src_env, dst_env, "deployment plan created");
        Ok(key)
    }

    /// Create a plan that deploys an OSP/OAP package to `dst_env_key`.
    pub async fn send_binary_deployment(
        &self,
        dst_env_key: &str,
        package: &Path,
    ) -> Result<String> {
        let bytes = tokio::fs::read(package)
            .await
            .map_err(|e| LifetimeError::io(package, e))?;
        let path = format!("environments/{dst_env_key}/deployments");
        let response = self.client.post_binary(&path, bytes).await?;
        let created = CREATE.expect(response, &format!("of package {}", package.display()))?;
        let key = plan_key(&created)?;
        info!(
            deployment_key = %key,
            package = %package.display(),
            "binary deployment plan created"
        );
        Ok(key)
    }

    pub async fn delete_deployment(&self, key: &str) -> Result<()> {
        let response = self.client.delete(&format!("deployments/{key}")).await?;
        DELETE.dispatch(response, key)?;
        Ok(())
    }

    pub async fn start_deployment(&self, key: &str, options: StartOptions) -> Result<()> {
        let query = options.query(self.version);
        let response = self
            .client
            .post(&format!("deployments/{key}/start"), &query, None)
            .await?;
        START.dispatch(response, key)?;
        Ok(())
    }

    pub async fn continue_deployment(&self, key: &str) -> Result<()> {
        let response = self
            .client
            .post(&format!("deployments/{key}/continue"), &[], None)
            .await?;
        CONTINUE.dispatch(response, key)?;
        Ok(())
    }
}

fn plan_key(created: &Value) -> Result<String> {
    let key = returned_key(created);
    if key.is_empty() {
        return Err(LifetimeError::InvalidJsonResponse {
            method: "POST",
            url: "deployments".to_string(),
            body: created.to_string(),
        });
    }
    Ok(key)
}
