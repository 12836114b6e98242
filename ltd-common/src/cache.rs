//! JSON artifact store.
//!
//! Every API result a pipeline step fetches is also written under the
//! artifact directory, both as a memo for later lookups and as build
//! artifacts that later pipeline stages (and humans) read. There is no
//! eviction: stale files are cleared explicitly on a lookup miss.

use crate::errors::{LifetimeError, Result};
use crate::util::file_safe;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

pub const DEFAULT_ARTIFACT_DIR: &str = "Artifacts";

/// Writes and reads JSON files relative to an artifact directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a cache name (spaces become underscores).
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(file_safe(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    /// Pretty-print `data` with 4-space indentation.
    pub fn store<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> Result<PathBuf> {
        let out = to_pretty_json(data).map_err(|source| LifetimeError::CacheJson {
            path: self.path(name),
            source,
        })?;
        self.store_bytes(name, &out)
    }

    /// Write raw bytes (exported packages).
    pub fn store_bytes(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path(name);
        ensure_parent(&path)?;
        std::fs::write(&path, bytes).map_err(|e| LifetimeError::io(&path, e))?;
        Ok(path)
    }

    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.path(name);
        if !path.is_file() {
            return Err(LifetimeError::CacheMiss { path });
        }
        let contents = std::fs::read(&path).map_err(|e| LifetimeError::io(&path, e))?;
        serde_json::from_slice(&contents)
            .map_err(|source| LifetimeError::CacheJson { path, source })
    }

    /// Load, treating a missing file as `None`.
    pub fn load_optional<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.load(name) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_cache_miss() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Remove a cache file; missing files are fine.
    pub fn clear(&self, name: &str) -> Result<()> {
        let path = self.path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LifetimeError::io(&path, e)),
        }
    }
}

pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LifetimeError::io(parent, e))?;
    }
    Ok(())
}

/// Names of every file the pipeline writes under the artifact directory.
pub struct CacheFile;

impl CacheFile {
    pub const APPLICATIONS: &'static str = "applications.cache";
    pub const ENVIRONMENTS: &'static str = "environments.cache";
    pub const DEPLOYMENTS: &'static str = "deployments.cache";
    pub const DEPLOYMENT_MANIFEST: &'static str = "deployment_data/deployment_manifest.cache";
    pub const DEPLOYMENT_ORDER: &'static str = "application_oap/deployment_order.cache";
    pub const CONFLICTS: &'static str = "DeploymentConflicts";
    pub const DEPLOY_ERRORS: &'static str = "DeploymentErrors";
    pub const GENERATED_MANIFEST: &'static str = "manifest/manifest.json";

    pub fn application(app: &str) -> String {
        format!("application_data/{app}.cache")
    }

    pub fn application_versions(app: &str) -> String {
        format!("application_data/{app}.versions.cache")
    }

    pub fn application_version(app: &str, version_key: &str) -> String {
        format!("application_data/{app}.{version_key}.version.cache")
    }

    pub fn environment_application(env: &str, app: &str) -> String {
        format!("environment_data/{env}.{app}.applications.cache")
    }

    pub fn environment_deployment_zones(env: &str) -> String {
        format!("environment_data/{env}.deploymentzones.cache")
    }

    pub fn deployment(key: &str) -> String {
        format!("deployment_data/{key}.cache")
    }

    pub fn deployment_status(key: &str) -> String {
        format!("deployment_data/{key}.status.cache")
    }

    pub fn deployment_plan(key: &str) -> String {
        format!("deployment_data/{key}.plan.cache")
    }

    pub fn oap(file_name: &str) -> String {
        format!("application_oap/{file_name}")
    }

    pub fn probe_dependencies(app: &str) -> String {
        format!("cicd_probe_data/{app}.dependencies.cache")
    }
}

/// JSON with 4-space indentation, the layout of every file this crate writes.
pub(crate) fn to_pretty_json<T: Serialize + ?Sized>(data: &T) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    data.serialize(&mut serializer)?;
    Ok(out)
}
