//! Typed views over LifeTime API payloads.
//!
//! Only the fields the pipeline reads are modelled; the raw JSON is what
//! gets cached, so nothing is lost for later stages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Environment {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Application {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub app_status_in_envs: Vec<AppStatusInEnv>,
}

impl Application {
    pub fn status_in(&self, env_key: &str) -> Option<&AppStatusInEnv> {
        self.app_status_in_envs
            .iter()
            .find(|status| status.environment_key == env_key)
    }
}

/// Running version of an application in one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppStatusInEnv {
    pub environment_key: String,
    pub base_application_version_key: String,
    #[serde(default)]
    pub deployment_zone_key: Option<String>,
    #[serde(default)]
    pub is_modified: bool,
    #[serde(default)]
    pub mobile_apps_status: Vec<MobileAppStatus>,
}

/// Native shell of a mobile application in one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MobileAppStatus {
    pub native_platform: String,
    #[serde(default)]
    pub version_number: String,
    #[serde(default)]
    pub is_modified: bool,
}

/// Native shell version sent along with a new application tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MobileVersion {
    pub native_platform: String,
    pub version_number: String,
    pub version_description: String,
}

/// Application as seen from one environment (environment app endpoint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnvironmentApplication {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub app_status_in_envs: Vec<AppStatusInEnv>,
}

impl EnvironmentApplication {
    pub fn status_in(&self, env_key: &str) -> Option<&AppStatusInEnv> {
        self.app_status_in_envs
            .iter()
            .find(|status| status.environment_key == env_key)
    }
}

/// A tagged application version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApplicationVersion {
    pub key: String,
    pub version: String,
    #[serde(default)]
    pub application_key: Option<String>,
    #[serde(default)]
    pub change_log: Option<String>,
    #[serde(default)]
    pub created_on: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentZone {
    pub key: String,
    pub name: String,
}

/// Entry of the deployment list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Deployment {
    pub key: String,
    #[serde(default)]
    pub source_environment_key: Option<String>,
    #[serde(default)]
    pub target_environment_key: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One application in a saved plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApplicationOperation {
    pub application_key: String,
    pub application_version_key: String,
    #[serde(default)]
    pub deployment_zone_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentPlan {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub application_operations: Vec<ApplicationOperation>,
}

/// Plan details with the conflicts LifeTime detected.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentInfo {
    #[serde(default)]
    pub deployment: DeploymentPlan,
    #[serde(default)]
    pub application_conflicts: Vec<Value>,
}

/// Execution status of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentStatusReport {
    pub deployment_status: String,
    #[serde(default)]
    pub info: Option<String>,
}

/// Export link returned for an application version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLink {
    #[serde(alias = "Url", alias = "URL")]
    pub url: String,
}
