//! Package export and dependency-first deployment order.

use super::flow::{Pipeline, apps_from_deployment_manifest};
use super::plan::AppToDeploy;
use crate::cache::CacheFile;
use crate::endpoint::ApiVersion;
use crate::errors::{LifetimeError, Result};
use crate::lifetime::EnvRef;
use crate::manifest::ManifestFile;
use crate::order::deployment_order;
use crate::probe::ProbeClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

const OAP_EXTENSION: &str = ".oap";

/// One exported application package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OapEntry {
    pub app_name: String,
    pub app_version: String,
    pub app_key: String,
    pub version_key: String,
    pub filename: String,
}

/// Where the applications to export come from.
#[derive(Debug, Clone, Copy)]
pub enum PackageSource<'a> {
    /// Versions running in the source environment.
    Running(&'a [String]),
    /// A deployment manifest (filtered by the app list) or a trigger manifest.
    Manifest {
        manifest: &'a ManifestFile,
        app_names: &'a [String],
        include_test_apps: bool,
    },
}

/// Producers of an application version.
#[async_trait]
pub trait DependencySource: Send + Sync {
    async fn dependencies(&self, app_name: &str, version: &str) -> Result<BTreeSet<String>>;
}

#[async_trait]
impl DependencySource for ProbeClient {
    async fn dependencies(&self, app_name: &str, version: &str) -> Result<BTreeSet<String>> {
        self.get_app_dependencies(app_name, version).await
    }
}

/// File names for the exported packages.
///
/// Friendly names look like `My_App_v1_2_0.oap`; otherwise the version
/// key names the file.
pub fn generate_oap_list(apps: &[AppToDeploy], friendly_names: bool) -> Vec<OapEntry> {
    apps.iter()
        .map(|app| {
            let filename = if friendly_names {
                format!(
                    "{}_v{}{OAP_EXTENSION}",
                    app.name.replace(' ', "_"),
                    app.version.replace('.', "_")
                )
            } else {
                format!("{}{OAP_EXTENSION}", app.version_key)
            };
            OapEntry {
                app_name: app.name.clone(),
                app_version: app.version.clone(),
                app_key: app.key.clone(),
                version_key: app.version_key.clone(),
                filename,
            }
        })
        .collect()
}

/// Sort packages so every producer comes before its consumers.
pub async fn generate_deployment_order(
    source: &dyn DependencySource,
    oaps: &[OapEntry],
) -> Result<Vec<OapEntry>> {
    let mut dependencies = BTreeMap::new();
    for oap in oaps {
        let producers = source.dependencies(&oap.app_name, &oap.app_version).await?;
        dependencies.insert(oap.app_key.clone(), producers);
    }
    let order = deployment_order(&dependencies)?;
    Ok(order
        .iter()
        .flat_map(|key| oaps.iter().filter(move |oap| &oap.app_key == key))
        .cloned()
        .collect())
}

impl Pipeline<'_> {
    /// Export OAP packages from `source_env`, optionally writing the deployment order.
    pub async fn fetch_apps_packages(
        &self,
        source_env: &str,
        source: PackageSource<'_>,
        friendly_names: bool,
        probe: Option<&dyn DependencySource>,
    ) -> Result<Vec<OapEntry>> {
        if self.lifetime.api_version() == ApiVersion::V1 {
            return Err(LifetimeError::InvalidParameters(
                "Not supported for LifeTime API v1".into(),
            ));
        }
        let source_env = self
            .lifetime
            .resolve_environment(EnvRef::Name(source_env))
            .await?;
        let apps = match source {
            PackageSource::Running(app_names) => {
                self.running_apps(&source_env, app_names, false).await?
            }
            PackageSource::Manifest {
                manifest: ManifestFile::Deployment(manifest),
                app_names,
                ..
            } => apps_from_deployment_manifest(manifest, app_names),
            PackageSource::Manifest {
                manifest: ManifestFile::Trigger(manifest),
                include_test_apps,
                ..
            } => {
                self.manifest_apps(manifest, &source_env, include_test_apps, false)
                    .await?
            }
        };

        let oaps = generate_oap_list(&apps, friendly_names);
        info!(apps = oaps.len(), src_env = %source_env.name, "exporting application packages");
        for oap in &oaps {
            self.lifetime
                .export_app_oap(&source_env.key, &oap.app_key, &oap.version_key, &oap.filename)
                .await?;
            info!(
                app = %oap.app_name,
                version = %oap.app_version,
                file = %oap.filename,
                "application exported"
            );
        }

        let Some(probe) = probe else {
            return Ok(oaps);
        };
        let sorted = generate_deployment_order(probe, &oaps).await?;
        for (position, oap) in sorted.iter().enumerate() {
            info!(
                position = position + 1,
                app = %oap.app_name,
                version_key = %oap.version_key,
                "deployment order"
            );
        }
        self.lifetime
            .store()
            .store(CacheFile::DEPLOYMENT_ORDER, &sorted)?;
        Ok(sorted)
    }
}
