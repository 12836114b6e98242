//! Deployment steps: create, execute and follow a plan.

use super::Session;
use super::helpers::{app_names, report};
use crate::{GlobalArgs, TriggerManifestArgs};
use anyhow::Result;
use ltd_common::deploy::DeployOptions;
use ltd_common::lifetime::EnvRef;
use ltd_common::manifest::{TriggerManifest, load_deployment_manifest};
use std::path::Path;
use tracing::info;

/// Where `deploy-package` sends the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Environment label in the trigger manifest.
    Label(String),
    /// Environment name in LifeTime.
    Name(String),
}

pub async fn deploy_latest_tags(
    global: &GlobalArgs,
    source_env: &str,
    destination_env: &str,
    app_list: &[String],
    manifest_file: Option<&Path>,
    options: DeployOptions,
) -> Result<u8> {
    let manifest = manifest_file.map(load_deployment_manifest).transpose()?;
    if let Some(path) = manifest_file {
        info!(
            manifest = %path.display(),
            "deploying the versions pinned by the deployment manifest"
        );
    }
    let session = Session::connect(global)?;
    let outcome = session
        .pipeline()
        .deploy_latest_tags(
            source_env,
            destination_env,
            &app_names(app_list),
            manifest.as_ref(),
            options,
        )
        .await?;
    Ok(report(&outcome))
}

pub async fn deploy_tags_with_manifest(
    global: &GlobalArgs,
    manifest: &TriggerManifestArgs,
    source_label: &str,
    destination_label: &str,
    include_test_apps: bool,
    options: DeployOptions,
) -> Result<u8> {
    let manifest = load_trigger_manifest(manifest)?;
    let session = Session::connect(global)?;
    let outcome = session
        .pipeline()
        .deploy_tags_with_manifest(
            &manifest,
            source_label,
            destination_label,
            include_test_apps,
            options,
        )
        .await?;
    Ok(report(&outcome))
}

pub async fn continue_deployment(global: &GlobalArgs, destination_env: &str) -> Result<u8> {
    let session = Session::connect(global)?;
    let outcome = session.pipeline().continue_deployment(destination_env).await?;
    Ok(report(&outcome))
}

pub async fn start_saved_plan(global: &GlobalArgs, destination_env: &str) -> Result<u8> {
    let session = Session::connect(global)?;
    let outcome = session.pipeline().start_saved_plan(destination_env).await?;
    Ok(report(&outcome))
}

pub async fn deploy_package(
    global: &GlobalArgs,
    manifest: &TriggerManifestArgs,
    destination: Destination,
    package: &Path,
    options: DeployOptions,
) -> Result<u8> {
    let session = Session::connect(global)?;
    let destination = match destination {
        Destination::Label(label) => load_trigger_manifest(manifest)?.environment_details(&label)?,
        Destination::Name(name) => {
            session
                .lifetime
                .resolve_environment(EnvRef::Name(&name))
                .await?
        }
    };
    info!(package = %package.display(), env = %destination.name, "deploying package");
    let outcome = session
        .pipeline()
        .deploy_package(&destination, package, options)
        .await?;
    Ok(report(&outcome))
}

pub async fn deploy_from_plan(
    global: &GlobalArgs,
    plan_key: &str,
    destination_env: &str,
) -> Result<u8> {
    let session = Session::connect(global)?;
    let outcome = session
        .pipeline()
        .deploy_from_plan(plan_key, destination_env)
        .await?;
    Ok(report(&outcome))
}

pub(crate) fn load_trigger_manifest(args: &TriggerManifestArgs) -> Result<TriggerManifest> {
    Ok(TriggerManifest::load(
        args.trigger_manifest.as_deref(),
        args.manifest_file.as_deref(),
    )?)
}
