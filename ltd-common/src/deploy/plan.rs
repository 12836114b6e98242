//! Plan contents and plan execution.

use super::DeploymentApi;
use crate::cache::CacheFile;
use crate::endpoint::ApiVersion;
use crate::errors::{LifetimeError, Result};
use crate::lifetime::{
    AppRef, AppStatusInEnv, DeploymentZone, EnvRef, Lifetime, RunningAppVersion, StartOptions,
};
use crate::manifest::{DeployedApplication, ManifestApplication};
use crate::version::same_version;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

/// Application version a pipeline step intends to deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppToDeploy {
    pub name: String,
    pub key: String,
    pub version: String,
    pub version_key: String,
    pub deployment_zone: Option<String>,
    pub change_log: Option<String>,
    pub created_on: Option<String>,
}

impl AppToDeploy {
    pub fn from_manifest(app: &ManifestApplication, include_zone: bool) -> Self {
        Self {
            name: app.application_name.clone(),
            key: app.application_key.clone(),
            version: app.version_number.clone(),
            version_key: app.version_key.clone(),
            deployment_zone: if include_zone { app.deployment_zone_name.clone() } else { None },
            change_log: app.change_log.clone(),
            created_on: app.created_on.clone(),
        }
    }

    pub fn deployed(&self) -> DeployedApplication {
        DeployedApplication {
            application_name: self.name.clone(),
            application_key: self.key.clone(),
            version: self.version.clone(),
            version_key: self.version_key.clone(),
            change_log: self.change_log.clone(),
            created_on: self.created_on.clone(),
        }
    }
}

impl From<RunningAppVersion> for AppToDeploy {
    fn from(running: RunningAppVersion) -> Self {
        Self {
            name: running.name,
            key: running.key,
            version: running.version,
            version_key: running.version_key,
            deployment_zone: None,
            change_log: running.change_log,
            created_on: running.created_on,
        }
    }
}

impl From<&DeployedApplication> for AppToDeploy {
    fn from(app: &DeployedApplication) -> Self {
        Self {
            name: app.application_name.clone(),
            key: app.application_key.clone(),
            version: app.version.clone(),
            version_key: app.version_key.clone(),
            deployment_zone: None,
            change_log: app.change_log.clone(),
            created_on: app.created_on.clone(),
        }
    }
}

/// One application entry of a deployment plan request.
///
/// LifeTime v1 takes bare version keys, v2 takes operations with a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DeployAppKey {
    V1(String),
    V2 {
        #[serde(rename = "ApplicationVersionKey")]
        application_version_key: String,
        #[serde(rename = "DeploymentZoneKey")]
        deployment_zone_key: String,
    },
}

impl DeployAppKey {
    pub fn new(version: ApiVersion, version_key: &str, zone_key: Option<String>) -> Self {
        match version {
            ApiVersion::V1 => Self::V1(version_key.to_string()),
            ApiVersion::V2 => Self::V2 {
                application_version_key: version_key.to_string(),
                deployment_zone_key: zone_key.unwrap_or_default(),
            },
        }
    }

    pub fn version_key(&self) -> &str {
        match self {
            Self::V1(key) => key,
            Self::V2 {
                application_version_key,
                ..
            } => application_version_key,
        }
    }
}

/// Lookups in the target environment needed to decide what to deploy.
#[async_trait]
pub trait TargetLookup: Send + Sync {
    /// Status of `app_key` in `env_key`, `None` when it is not deployed there.
    async fn app_status(&self, env_key: &str, app_key: &str) -> Result<Option<AppStatusInEnv>>;

    /// Version number of an application version.
    async fn version_number(&self, app_key: &str, version_key: &str) -> Result<String>;

    async fn deployment_zones(&self, env_key: &str) -> Result<Vec<DeploymentZone>>;
}

#[async_trait]
impl TargetLookup for Lifetime {
    async fn app_status(&self, env_key: &str, app_key: &str) -> Result<Option<AppStatusInEnv>> {
        match self
            .get_environment_app_version(EnvRef::Key(env_key), AppRef::Key(app_key), true)
            .await
        {
            Ok(app) => Ok(app.status_in(env_key).cloned()),
            Err(LifetimeError::AppDoesNotExist(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn version_number(&self, app_key: &str, version_key: &str) -> Result<String> {
        Ok(self
            .get_application_version(AppRef::Key(app_key), version_key)
            .await?
            .version)
    }

    async fn deployment_zones(&self, env_key: &str) -> Result<Vec<DeploymentZone>> {
        self.get_environment_deployment_zones(EnvRef::Key(env_key)).await
    }
}

/// Keep only the applications whose version is not yet in the target environment.
pub async fn check_if_can_deploy(
    lookup: &dyn TargetLookup,
    version: ApiVersion,
    env_key: &str,
    env_name: &str,
    apps: &[AppToDeploy],
    include_deployment_zones: bool,
) -> Result<Vec<DeployAppKey>> {
    let zones = if include_deployment_zones {
        lookup.deployment_zones(env_key).await?
    } else {
        Vec::new()
    };

    let mut keys = Vec::new();
    for app in apps {
        let target_zone = app
            .deployment_zone
            .as_deref()
            .and_then(|name| zones.iter().find(|zone| zone.name == name));
        let report_missing_zone = || {
            if let Some(zone) = app.deployment_zone.as_deref().filter(|z| !z.is_empty()) {
                if include_deployment_zones && target_zone.is_none() {
                    warn!(zone, env = env_name, "deployment zone not found in environment");
                }
            }
        };

        let zone_key = match lookup.app_status(env_key, &app.key).await? {
            Some(status) if status.base_application_version_key == app.version_key => {
                info!(
                    app = %app.name,
                    version = %app.version,
                    env = env_name,
                    "skipping application: VersionKey is equal"
                );
                continue;
            }
            Some(status) => {
                let running = lookup
                    .version_number(&app.key, &status.base_application_version_key)
                    .await?;
                if same_version(&running, &app.version) {
                    info!(
                        app = %app.name,
                        version = %app.version,
                        env = env_name,
                        "skipping application: VersionTag is equal"
                    );
                    continue;
                }
                report_missing_zone();
                target_zone
                    .filter(|zone| status.deployment_zone_key.as_deref() != Some(zone.key.as_str()))
                    .map(|zone| zone.key.clone())
            }
            None => {
                info!(
                    app = %app.name,
                    version = %app.version,
                    env = env_name,
                    "application does not exist in environment, deploying it"
                );
                report_missing_zone();
                target_zone.map(|zone| zone.key.clone())
            }
        };

        match (&zone_key, target_zone) {
            (Some(_), Some(zone)) => info!(
                app = %app.name,
                version = %app.version,
                env = env_name,
                zone = %zone.name,
                "adding application to the deployment plan"
            ),
            _ => info!(
                app = %app.name,
                version = %app.version,
                env = env_name,
                "adding application to the deployment plan"
            ),
        }
        keys.push(DeployAppKey::new(version, &app.version_key, zone_key));
    }
    Ok(keys)
}

/// How a created plan is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanExecution {
    pub allow_continue_with_errors: bool,
    pub redeploy_outdated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
    Started { with_conflicts: bool },
    /// The plan had conflicts and was deleted.
    ConflictsAborted,
}

/// Check a created plan for conflicts, then start it or delete it.
pub async fn execute_plan(
    api: &dyn DeploymentApi,
    key: &str,
    execution: PlanExecution,
) -> Result<PlanOutcome> {
    let info = api.info(key).await?;
    let with_conflicts = !info.application_conflicts.is_empty();
    let version = api.api_version();

    if with_conflicts {
        api.store_artifact(
            CacheFile::CONFLICTS,
            &Value::Array(info.application_conflicts.clone()),
        )?;
        if !execution.allow_continue_with_errors || version == ApiVersion::V1 {
            warn!(
                deployment_key = key,
                artifact = CacheFile::CONFLICTS,
                "deployment plan has conflicts and will be aborted"
            );
            api.delete(key).await?;
            info!(deployment_key = key, "deployment plan was deleted successfully");
            return Ok(PlanOutcome::ConflictsAborted);
        }
        warn!(
            deployment_key = key,
            artifact = CacheFile::CONFLICTS,
            "deployment plan has conflicts but will continue with errors"
        );
    }

    let options = if with_conflicts {
        StartOptions {
            redeploy_outdated: Some(false),
            continue_with_errors: Some(true),
        }
    } else {
        StartOptions::redeploy(execution.redeploy_outdated)
    };
    api.start(key, options).await?;
    info!(deployment_key = key, "deployment plan started being executed");
    Ok(PlanOutcome::Started { with_conflicts })
}
