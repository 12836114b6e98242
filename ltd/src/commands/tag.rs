use super::Session;
use super::deploy::load_trigger_manifest;
use super::helpers::app_names;
use crate::{GlobalArgs, TriggerManifestArgs};
use anyhow::{Result, bail};
use ltd_common::manifest::load_deployment_manifest;
use std::path::Path;
use tracing::{info, warn};

pub async fn tag_apps(
    global: &GlobalArgs,
    destination_env: &str,
    app_list: &[String],
    manifest_file: &Path,
) -> Result<u8> {
    let manifest = load_deployment_manifest(manifest_file)?;
    let names = app_names(app_list);
    let session = Session::connect(global)?;
    let tagged = session
        .pipeline()
        .tag_apps(destination_env, &names, &manifest)
        .await?;
    if tagged < names.len() {
        warn!(
            requested = names.len(),
            tagged,
            manifest = %manifest_file.display(),
            "some applications are not in the deployment manifest"
        );
    }
    info!(tagged, env = destination_env, "applications tagged");
    Ok(0)
}

/// Tag the applications changed in `destination_env` since their last version.
///
/// A trigger manifest, when given, replaces `app_list`.
pub async fn tag_modified_apps(
    global: &GlobalArgs,
    destination_env: &str,
    app_list: &[String],
    manifest: &TriggerManifestArgs,
    log_msg: &str,
) -> Result<u8> {
    let names = if manifest.trigger_manifest.is_some() || manifest.manifest_file.is_some() {
        load_trigger_manifest(manifest)?
            .applications(true)
            .map(|app| app.application_name.clone())
            .collect()
    } else {
        app_names(app_list)
    };
    if names.is_empty() {
        bail!("either --app-list or a trigger manifest must be provided");
    }
    let session = Session::connect(global)?;
    let tagged = session
        .pipeline()
        .tag_modified_apps(destination_env, &names, log_msg)
        .await?;
    info!(
        tagged = tagged.len(),
        checked = names.len(),
        env = destination_env,
        "modified applications tagged"
    );
    Ok(0)
}
