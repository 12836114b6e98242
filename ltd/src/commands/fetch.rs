//! Read-only steps: cache LifeTime data, validate manifests, export packages.

use super::Session;
use super::deploy::load_trigger_manifest;
use super::helpers::app_names;
use crate::{GlobalArgs, ProbeArgs, TriggerManifestArgs};
use anyhow::Result;
use ltd_common::deploy::{DependencySource, PackageSource};
use ltd_common::manifest::{ManifestFile, TriggerManifest};
use ltd_common::probe::ProbeClient;
use ltd_common::{ArtifactStore, CacheFile, LifetimeEndpoint, LifetimeError};
use tracing::{error, info};

pub async fn fetch_lifetime_data(global: &GlobalArgs) -> Result<u8> {
    let session = Session::connect(global)?;
    let environments = session.lifetime.get_environments().await?;
    info!(count = environments.len(), file = CacheFile::ENVIRONMENTS, "environments cached");
    let applications = session.lifetime.get_applications(true).await?;
    info!(count = applications.len(), file = CacheFile::APPLICATIONS, "applications cached");
    Ok(0)
}

/// A missing application fails the step with 1; lookup errors are 2.
pub async fn validate_manifest_apps(
    global: &GlobalArgs,
    manifest: &TriggerManifestArgs,
    env_label: &str,
    include_test_apps: bool,
) -> Result<u8> {
    let manifest = load_trigger_manifest(manifest)?;
    let environment = manifest.environment_details(env_label)?;
    let session = Session::connect(global)?;
    match session
        .pipeline()
        .validate_manifest_apps(&manifest, &environment, include_test_apps)
        .await
    {
        Ok(()) => Ok(0),
        Err(LifetimeError::AppDoesNotExist(message)) => {
            error!(env = %environment.name, %message, "manifest validation failed");
            Ok(1)
        }
        Err(err) => Err(err.into()),
    }
}

/// Inputs of `fetch-apps-packages` besides the manifest and probe flags.
#[derive(Debug, Clone)]
pub struct PackagesRequest {
    pub source_env: String,
    pub app_list: Vec<String>,
    pub include_test_apps: bool,
    pub friendly_package_names: bool,
    pub generate_deploy_order: bool,
}

pub async fn fetch_apps_packages(
    global: &GlobalArgs,
    manifest: &TriggerManifestArgs,
    probe_args: &ProbeArgs,
    request: PackagesRequest,
) -> Result<u8> {
    let manifest = match (&manifest.trigger_manifest, &manifest.manifest_file) {
        (Some(inline), _) => Some(ManifestFile::Trigger(TriggerManifest::parse(inline)?)),
        (None, Some(path)) => Some(ManifestFile::load(path)?),
        (None, None) => None,
    };
    let names = app_names(&request.app_list);
    if manifest.is_none() && names.is_empty() {
        anyhow::bail!(
            "fetch-apps-packages needs --app-list, --trigger-manifest or --manifest-file"
        );
    }

    let session = Session::connect(global)?;
    let probe = if request.generate_deploy_order {
        Some(probe_client(global, probe_args, session.config.ssl_cert_verify)?)
    } else {
        None
    };
    let source = match &manifest {
        Some(manifest) => PackageSource::Manifest {
            manifest,
            app_names: &names,
            include_test_apps: request.include_test_apps,
        },
        None => PackageSource::Running(&names),
    };
    let oaps = session
        .pipeline()
        .fetch_apps_packages(
            &request.source_env,
            source,
            request.friendly_package_names,
            probe.as_ref().map(|probe| probe as &dyn DependencySource),
        )
        .await?;
    info!(
        packages = oaps.len(),
        dir = %global.artifacts.display(),
        "application packages exported"
    );
    Ok(0)
}

fn probe_client(
    global: &GlobalArgs,
    args: &ProbeArgs,
    ssl_cert_verify: bool,
) -> Result<ProbeClient> {
    let host = args
        .probe_url
        .as_deref()
        .or(global.lt_url.as_deref())
        .unwrap_or_default();
    let endpoint = LifetimeEndpoint::parse(host, &args.probe_endpoint, args.probe_version);
    Ok(ProbeClient::new(
        endpoint,
        args.probe_key.as_deref(),
        ssl_cert_verify,
        ArtifactStore::new(&global.artifacts),
    )?)
}
