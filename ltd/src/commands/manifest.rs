//! `ltd manifest generate|merge|schema`

use super::Session;
use super::helpers::app_names;
use crate::GlobalArgs;
use anyhow::Result;
use ltd_common::CacheFile;
use ltd_common::manifest::{self, TriggerManifest};
use std::path::Path;
use tracing::info;

pub async fn generate(
    global: &GlobalArgs,
    source_env: &str,
    app_list: &[String],
    notes: &str,
) -> Result<u8> {
    let session = Session::connect(global)?;
    let names = app_names(app_list);
    let generated = manifest::generate(&session.lifetime, source_env, &names, notes).await?;
    let path = session.lifetime.store().path(CacheFile::GENERATED_MANIFEST);
    info!(
        apps = generated.application_versions.len(),
        path = %path.display(),
        "trigger manifest generated"
    );
    println!("{}", path.display());
    Ok(0)
}

pub fn merge(folder: &Path, output: &Path) -> Result<u8> {
    let merged = manifest::merge_manifest_dir(folder, output)?;
    info!(apps = merged.application_versions.len(), "manifests merged");
    println!("{}", output.display());
    Ok(0)
}

pub fn schema() -> Result<u8> {
    println!("{}", serde_json::to_string_pretty(&TriggerManifest::schema())?);
    Ok(0)
}
