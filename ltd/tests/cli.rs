mod common;

use common::{assert_contains, init_test_logging, ltd};
use serde_json::{Value, json};
use tempfile::TempDir;

#[test]
fn test_help_lists_pipeline_steps() {
    init_test_logging();
    crate::test_log!("TEST START: test_help_lists_pipeline_steps");

    let output = ltd(&["--help"]);

    assert!(output.status.success(), "ltd --help failed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains(&stdout, "LifeTime Deploy");
    for step in [
        "deploy-latest-tags",
        "deploy-tags-with-manifest",
        "continue-deployment",
        "deploy-package",
        "deploy-from-plan",
        "fetch-lifetime-data",
        "tag-apps",
        "tag-modified-apps",
        "start-saved-plan",
        "validate-manifest-apps",
        "fetch-apps-packages",
        "manifest",
        "errors",
    ] {
        assert_contains(&stdout, step);
    }
    crate::test_log!("TEST PASS: test_help_lists_pipeline_steps");
}

#[test]
fn test_errors_lists_catalog_by_category() {
    init_test_logging();
    let output = ltd(&["errors"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains(&stdout, "Configuration:");
    assert_contains(&stdout, "[LTD-E001]");
    assert_contains(&stdout, "Deployment:");
    assert_contains(&stdout, "[LTD-E402]");
}

#[test]
fn test_errors_shows_one_entry_with_remediation() {
    init_test_logging();
    let output = ltd(&["errors", "ltd-e006"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains(&stdout, "[LTD-E006]");
    assert_contains(&stdout, "Remediation steps:");
}

#[test]
fn test_unknown_error_code_exits_2() {
    init_test_logging();
    let output = ltd(&["errors", "LTD-E999"]);

    assert_eq!(output.status.code(), Some(2));
    assert_contains(&String::from_utf8_lossy(&output.stderr), "unknown error code");
}

#[test]
fn test_missing_connection_exits_2_with_code() {
    init_test_logging();
    let artifacts = TempDir::new().unwrap();
    let output = ltd(&[
        "continue-deployment",
        "-d",
        "QA",
        "--artifacts",
        artifacts.path().to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_contains(&stderr, "error[LTD-E006]");
    assert_contains(&stderr, "--lt-url");
}

#[test]
fn test_missing_trigger_manifest_exits_2() {
    init_test_logging();
    let output = ltd(&["validate-manifest-apps", "-e", "Test"]);

    assert_eq!(output.status.code(), Some(2));
    assert_contains(&String::from_utf8_lossy(&output.stderr), "error[LTD-E204]");
}

#[test]
fn test_missing_config_file_exits_2() {
    init_test_logging();
    let output = ltd(&[
        "fetch-lifetime-data",
        "--config-file",
        "/nonexistent/ltd.toml",
        "--lt-url",
        "lifetime.example.com",
        "--lt-token",
        "token",
    ]);

    assert_eq!(output.status.code(), Some(2));
    assert_contains(&String::from_utf8_lossy(&output.stderr), "error[LTD-E001]");
}

#[test]
fn test_manifest_schema_describes_trigger_manifest() {
    init_test_logging();
    let output = ltd(&["manifest", "schema"]);

    assert!(output.status.success());
    let schema: Value = serde_json::from_slice(&output.stdout).expect("schema is JSON");
    assert_eq!(schema["title"], "TriggerManifest");
    assert!(schema["properties"]["ApplicationVersions"].is_object());
    assert!(schema["properties"]["EnvironmentDefinitions"].is_object());
}

#[test]
fn test_manifest_merge_folder() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let folder = dir.path().join("manifests");
    std::fs::create_dir(&folder).unwrap();
    let first = json!({
        "ApplicationVersions": [{
            "ApplicationName": "Portal",
            "ApplicationKey": "a1",
            "VersionKey": "v1",
            "VersionNumber": "1.0"
        }],
        "EnvironmentDefinitions": [{
            "EnvironmentKey": "k-dev",
            "EnvironmentName": "Development",
            "EnvironmentLabel": "Dev"
        }],
        "DeploymentNotes": "first",
        "TriggeredBy": {"Name": "someone"}
    });
    let second = json!({
        "ApplicationVersions": [{
            "ApplicationName": "Backoffice",
            "ApplicationKey": "a2",
            "VersionKey": "v2",
            "VersionNumber": "2.0"
        }],
        "EnvironmentDefinitions": [{
            "EnvironmentKey": "k-qa",
            "EnvironmentName": "QA",
            "EnvironmentLabel": "Test"
        }],
        "DeploymentNotes": "second"
    });
    std::fs::write(folder.join("a.json"), first.to_string()).unwrap();
    std::fs::write(folder.join("b.json"), second.to_string()).unwrap();
    std::fs::write(folder.join("notes.txt"), "ignored").unwrap();
    let out = dir.path().join("merged.json");

    let output = ltd(&[
        "manifest",
        "merge",
        "--folder",
        folder.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
    ]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let merged: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(merged["ApplicationVersions"].as_array().unwrap().len(), 2);
    assert_eq!(merged["EnvironmentDefinitions"][0]["EnvironmentLabel"], "Test");
    assert_eq!(merged["DeploymentNotes"], "a.json: first\nb.json: second\n");
    assert!(merged.get("TriggeredBy").is_none());
}

#[test]
fn test_manifest_merge_empty_folder_exits_2() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let output = ltd(&["manifest", "merge", "--folder", dir.path().to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(2));
    assert_contains(&String::from_utf8_lossy(&output.stderr), "LTD-E204");
}

#[test]
fn test_tag_modified_apps_without_inputs_exits_2() {
    init_test_logging();
    let output = ltd(&["tag-modified-apps", "-d", "QA"]);

    assert_eq!(output.status.code(), Some(2));
    assert_contains(&String::from_utf8_lossy(&output.stderr), "--app-list");
}
