use ltd_common::PipelineConfig;
use ltd_common::manifest::TriggerManifest;
use serde_json::{Value, json};
use std::path::Path;
use tempfile::TempDir;

/// Artifact directory for one test.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        crate::test_log!("FIXTURE: Creating artifact directory");
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Short timeouts; paired with an instant sleeper nothing actually waits.
pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        queue_timeout_secs: 40,
        deployment_timeout_secs: 100,
        sleep_period_secs: 20,
        ..PipelineConfig::default()
    }
}

/// Trigger manifest with Development (`k-dev`) and QA (`k-qa`) labels.
pub fn trigger_manifest(apps: &[(&str, &str, &str, &str)]) -> TriggerManifest {
    let versions: Vec<Value> = apps
        .iter()
        .map(|(name, key, version_key, version)| {
            json!({
                "ApplicationName": name,
                "ApplicationKey": key,
                "VersionKey": version_key,
                "VersionNumber": version,
                "IsTestApplication": name.ends_with("_Tests"),
            })
        })
        .collect();
    serde_json::from_value(json!({
        "ApplicationVersions": versions,
        "EnvironmentDefinitions": [
            {
                "EnvironmentKey": "k-dev",
                "EnvironmentName": "Development",
                "EnvironmentLabel": "Dev"
            },
            {"EnvironmentKey": "k-qa", "EnvironmentName": "QA", "EnvironmentLabel": "Test"}
        ],
        "DeploymentNotes": "release 42"
    }))
    .expect("valid trigger manifest")
}
