//! Trigger and deployment manifests.
//!
//! A trigger manifest is produced by the pipeline trigger (or by
//! `manifest generate`) and pins the exact application versions and the
//! environment labels a run works with. A deployment manifest is the list
//! of versions a deploy step actually promoted, handed to later stages.

use crate::cache::{CacheFile, ensure_parent, to_pretty_json};
use crate::config::DEFAULT_DEPLOYMENT_MESSAGE;
use crate::errors::{LifetimeError, Result};
use crate::lifetime::{AppRef, EnvRef, Lifetime, Named};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File written by [`merge_manifest_dir`] when no output path is given.
pub const MERGED_MANIFEST_FILE: &str = "merged_manifest.json";

/// Application version pinned by a trigger manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ManifestApplication {
    pub application_name: String,
    pub application_key: String,
    pub version_key: String,
    pub version_number: String,
    #[serde(default)]
    pub is_test_application: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_zone_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_zone_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_log: Option<String>,
    /// Fields this tool does not interpret; kept when a manifest is rewritten.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct EnvironmentDefinition {
    pub environment_key: String,
    pub environment_name: String,
    pub environment_label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct TriggerManifest {
    #[serde(default)]
    pub application_versions: Vec<ManifestApplication>,
    #[serde(default)]
    pub environment_definitions: Vec<EnvironmentDefinition>,
    #[serde(default)]
    pub configuration_items: Vec<Value>,
    #[serde(default)]
    pub pipeline_parameters: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<Value>,
}

impl TriggerManifest {
    /// Load from inline JSON (`--trigger-manifest`) or a file (`--manifest-file`).
    ///
    /// Inline JSON wins when both are given.
    pub fn load(inline: Option<&str>, file: Option<&Path>) -> Result<Self> {
        match (inline, file) {
            (Some(json), _) => Self::parse(json),
            (None, Some(path)) => Self::parse(&read_manifest(path)?),
            (None, None) => Err(LifetimeError::ManifestDoesNotExist(
                "The manifest is required: use either --trigger-manifest or --manifest-file".into(),
            )),
        }
    }

    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| LifetimeError::InvalidManifest(err.to_string()))
    }

    /// `(name, key)` of the environment with `label`.
    pub fn environment_details(&self, label: &str) -> Result<Named> {
        self.environment_definitions
            .iter()
            .find(|env| env.environment_label == label)
            .map(|env| Named {
                name: env.environment_name.clone(),
                key: env.environment_key.clone(),
            })
            .ok_or_else(|| {
                LifetimeError::EnvironmentNotFound(format!(
                    "Failed to retrieve the environment key from label. \
                     Please make sure the label is correct. Environment label: {label}"
                ))
            })
    }

    pub fn deployment_notes(&self) -> &str {
        self.deployment_notes
            .as_deref()
            .unwrap_or(DEFAULT_DEPLOYMENT_MESSAGE)
    }

    /// Application versions, leaving out test applications unless asked.
    pub fn applications(
        &self,
        include_test_apps: bool,
    ) -> impl Iterator<Item = &ManifestApplication> {
        self.application_versions
            .iter()
            .filter(move |app| include_test_apps || !app.is_test_application)
    }

    /// JSON schema of the trigger manifest.
    pub fn schema() -> Value {
        serde_json::to_value(schemars::schema_for!(TriggerManifest)).unwrap_or(Value::Null)
    }
}

/// One promoted application version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct DeployedApplication {
    pub application_name: String,
    pub application_key: String,
    pub version: String,
    pub version_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_log: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
}

/// Versions promoted by a deploy step.
pub type DeploymentManifest = Vec<DeployedApplication>;

/// A manifest file is either a deployment manifest (a list) or a trigger manifest (an object).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ManifestFile {
    Deployment(DeploymentManifest),
    Trigger(TriggerManifest),
}

impl ManifestFile {
    pub fn load(path: &Path) -> Result<Self> {
        serde_json::from_str(&read_manifest(path)?)
            .map_err(|err| LifetimeError::InvalidManifest(format!("{}: {err}", path.display())))
    }
}

pub fn load_deployment_manifest(path: &Path) -> Result<DeploymentManifest> {
    serde_json::from_str(&read_manifest(path)?)
        .map_err(|err| LifetimeError::InvalidManifest(format!("{}: {err}", path.display())))
}

fn read_manifest(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(LifetimeError::ManifestDoesNotExist(format!(
            "The manifest file {} does not exist",
            path.display()
        )));
    }
    std::fs::read_to_string(path).map_err(|e| LifetimeError::io(path, e))
}

/// Merge trigger manifests in order.
///
/// Lists are appended, environment definitions are taken from the last
/// file, `TriggeredBy` is dropped and every file's notes are kept as
/// `"{file}: {notes}\n"`.
pub fn merge(files: &[PathBuf]) -> Result<TriggerManifest> {
    if files.is_empty() {
        return Err(LifetimeError::ManifestDoesNotExist(
            "There are no manifest files to merge".into(),
        ));
    }
    let mut merged = TriggerManifest::default();
    let mut notes = String::new();
    for path in files {
        let manifest = TriggerManifest::parse(&read_manifest(path)?)
            .map_err(|err| LifetimeError::InvalidManifest(format!("{}: {err}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(file = %file_name, "merging manifest");
        merged.application_versions.extend(manifest.application_versions);
        merged.configuration_items.extend(manifest.configuration_items);
        merged.pipeline_parameters.extend(manifest.pipeline_parameters);
        merged.environment_definitions = manifest.environment_definitions;
        notes.push_str(&format!(
            "{file_name}: {}\n",
            manifest.deployment_notes.unwrap_or_default()
        ));
    }
    merged.deployment_notes = Some(notes);
    Ok(merged)
}

/// `*.json` files directly inside `folder`, sorted by name.
pub fn manifest_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(folder).map_err(|e| LifetimeError::io(folder, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| LifetimeError::io(folder, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    if files.is_empty() {
        return Err(LifetimeError::ManifestDoesNotExist(format!(
            "Make sure that the manifest files exist in the '{}' directory",
            folder.display()
        )));
    }
    Ok(files)
}

/// Merge every manifest in `folder` and write the result to `output`.
pub fn merge_manifest_dir(folder: &Path, output: &Path) -> Result<TriggerManifest> {
    let files = manifest_files(folder)?;
    let merged = merge(&files)?;
    write_json(output, &merged)?;
    info!(output = %output.display(), files = files.len(), "merged manifest written");
    Ok(merged)
}

pub(crate) fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    ensure_parent(path)?;
    let json = to_pretty_json(data).map_err(|source| LifetimeError::CacheJson {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(|e| LifetimeError::io(path, e))
}

/// Build a trigger manifest from the versions running in `src_env`.
///
/// Stored as `manifest/manifest.json` under the artifact directory.
pub async fn generate(
    lifetime: &Lifetime,
    src_env: &str,
    apps: &[String],
    notes: &str,
) -> Result<TriggerManifest> {
    let environment_definitions: Vec<EnvironmentDefinition> = lifetime
        .get_environments()
        .await?
        .into_iter()
        .map(|env| EnvironmentDefinition {
            environment_key: env.key,
            environment_label: env.name.clone(),
            environment_name: env.name,
        })
        .collect();
    let src_key = environment_definitions
        .iter()
        .find(|env| env.environment_name == src_env)
        .map(|env| env.environment_key.clone())
        .ok_or_else(|| {
            LifetimeError::EnvironmentNotFound(format!("Environment name: {src_env}"))
        })?;
    let zones = lifetime
        .get_environment_deployment_zones(EnvRef::Key(&src_key))
        .await?;

    let mut application_versions = Vec::with_capacity(apps.len());
    for app_name in apps.iter().map(|name| name.trim()) {
        let running = lifetime
            .get_running_app_version(&src_key, AppRef::Name(app_name))
            .await?;
        let data = lifetime
            .get_application_data(AppRef::Key(&running.key), true)
            .await?;
        let zone_key = data
            .status_in(&src_key)
            .and_then(|status| status.deployment_zone_key.clone());
        let zone_name = zone_key.as_deref().and_then(|key| {
            zones
                .iter()
                .find(|zone| zone.key == key)
                .map(|zone| zone.name.clone())
        });
        if zone_key.is_some() && zone_name.is_none() {
            warn!(app = app_name, "deployment zone of application not found in source environment");
        }
        application_versions.push(ManifestApplication {
            application_name: running.name,
            application_key: running.key,
            version_key: running.version_key,
            version_number: running.version,
            is_test_application: false,
            deployment_zone_name: zone_name,
            deployment_zone_key: zone_key,
            created_on: running.created_on,
            change_log: running.change_log,
            extra: BTreeMap::new(),
        });
    }

    let manifest = TriggerManifest {
        application_versions,
        environment_definitions,
        deployment_notes: Some(notes.to_string()),
        ..TriggerManifest::default()
    };
    lifetime
        .store()
        .store(CacheFile::GENERATED_MANIFEST, &manifest)?;
    info!(apps = manifest.application_versions.len(), src_env, "manifest generated");
    Ok(manifest)
}
