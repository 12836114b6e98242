mod common;

use axum::http::StatusCode;
use common::{
    MockLifetime, Workspace, assert_artifact, assert_called, assert_not_called, fast_config,
    init_test_logging, trigger_manifest,
};
use ltd_common::{CacheFile, LifetimeError};
use ltd_common::deploy::{DeployOptions, DeployOutcome, DeploymentStatus, InstantSleeper, Pipeline};
use ltd_common::lifetime::Named;
use serde_json::json;

/// Portal runs 1.0 (`vk-1`) in QA and 1.1 (`vk-2`) in Development.
async fn lifetime_with_portal() -> MockLifetime {
    let mock = MockLifetime::start().await;
    mock.environment("k-dev", "Development")
        .environment("k-qa", "QA")
        .application(
            "app-1",
            "Portal",
            &[("vk-1", "1.0"), ("vk-2", "1.1")],
            &[("k-dev", "vk-2"), ("k-qa", "vk-1")],
        );
    mock
}

fn portal_manifest() -> ltd_common::manifest::TriggerManifest {
    trigger_manifest(&[("Portal", "app-1", "vk-2", "1.1")])
}

#[tokio::test]
async fn test_manifest_deploy_finishes_and_writes_deployment_manifest() {
    init_test_logging();
    crate::test_log!("TEST START: test_manifest_deploy_finishes_and_writes_deployment_manifest");

    let mock = lifetime_with_portal().await;
    mock.statuses("plan-1", &[("running", None), ("finished_successful", None)]);
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let outcome = pipeline
        .deploy_tags_with_manifest(
            &portal_manifest(),
            "Dev",
            "Test",
            false,
            DeployOptions::default(),
        )
        .await
        .expect("deploy");

    assert_eq!(outcome, DeployOutcome::Finished(DeploymentStatus::FinishedSuccessful));
    let calls = mock.calls();
    assert_called(&calls, "POST /deployments");
    assert_called(&calls, "POST /deployments/plan-1/start?RedeployOutdated=true");
    assert_eq!(sleeper.calls().len(), 1);

    let manifest = assert_artifact(workspace.path(), CacheFile::DEPLOYMENT_MANIFEST);
    assert_eq!(manifest[0]["ApplicationName"], "Portal");
    assert_eq!(manifest[0]["Version"], "1.1");
    assert_eq!(manifest[0]["VersionKey"], "vk-2");

    let plan = assert_artifact(workspace.path(), &CacheFile::deployment_plan("plan-1"));
    assert_eq!(plan["Notes"], "release 42");
    assert_eq!(
        plan["ApplicationOperations"],
        json!([{"ApplicationVersionKey": "vk-2", "DeploymentZoneKey": ""}])
    );
    crate::test_log!("TEST PASS: test_manifest_deploy_finishes_and_writes_deployment_manifest");
}

#[tokio::test]
async fn test_same_version_in_target_is_skipped() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let manifest = trigger_manifest(&[("Portal", "app-1", "vk-1", "1.0")]);
    let outcome = pipeline
        .deploy_tags_with_manifest(&manifest, "Dev", "Test", false, DeployOptions::default())
        .await
        .expect("deploy");

    assert_eq!(outcome, DeployOutcome::Skipped);
    assert_eq!(outcome.exit_code(), 0);
    assert_not_called(&mock.calls(), "POST /deployments");
}

#[tokio::test]
async fn test_two_step_stops_after_prepare_unless_forced() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    mock.statuses(
        "plan-1",
        &[("running", None), ("needs_user_intervention", Some("deployment_prepared"))],
    );
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let outcome = pipeline
        .deploy_tags_with_manifest(
            &portal_manifest(),
            "Dev",
            "Test",
            false,
            DeployOptions::default(),
        )
        .await
        .expect("deploy");

    assert_eq!(outcome, DeployOutcome::FirstStepFinished);
    assert_not_called(&mock.calls(), "POST /deployments/plan-1/continue");
    assert_artifact(workspace.path(), CacheFile::DEPLOYMENT_MANIFEST);
}

#[tokio::test]
async fn test_forced_two_step_continues_to_the_end() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    mock.statuses(
        "plan-1",
        &[
            ("needs_user_intervention", Some("deployment_prepared")),
            ("running", None),
            ("finished_with_warnings", None),
        ],
    );
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let options = DeployOptions {
        force_two_step: true,
        ..DeployOptions::default()
    };
    let outcome = pipeline
        .deploy_tags_with_manifest(&portal_manifest(), "Dev", "Test", false, options)
        .await
        .expect("deploy");

    assert_eq!(outcome, DeployOutcome::Finished(DeploymentStatus::FinishedWithWarnings));
    assert_called(&mock.calls(), "POST /deployments/plan-1/continue");
}

#[tokio::test]
async fn test_conflicts_delete_the_plan() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    let conflicts = json!([{"ApplicationName": "Portal", "Reason": "outdated"}]);
    mock.plan_info("plan-1", json!([]), conflicts);
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let outcome = pipeline
        .deploy_tags_with_manifest(
            &portal_manifest(),
            "Dev",
            "Test",
            false,
            DeployOptions::default(),
        )
        .await
        .expect("deploy");

    assert_eq!(outcome, DeployOutcome::ConflictsAborted);
    assert_eq!(outcome.exit_code(), 1);
    let calls = mock.calls();
    assert_called(&calls, "DELETE /deployments/plan-1");
    assert_not_called(&calls, "POST /deployments/plan-1/start");
    let conflicts = assert_artifact(workspace.path(), CacheFile::CONFLICTS);
    assert_eq!(conflicts[0]["Reason"], "outdated");
}

#[tokio::test]
async fn test_conflicts_continue_with_errors_when_configured() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    mock.plan_info("plan-1", json!([]), json!([{"ApplicationName": "Portal"}]))
        .statuses("plan-1", &[("finished_successful", None)]);
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = ltd_common::PipelineConfig {
        allow_continue_with_errors: true,
        ..fast_config()
    };
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let outcome = pipeline
        .deploy_tags_with_manifest(
            &portal_manifest(),
            "Dev",
            "Test",
            false,
            DeployOptions::default(),
        )
        .await
        .expect("deploy");

    assert_eq!(outcome, DeployOutcome::Finished(DeploymentStatus::FinishedSuccessful));
    assert_called(
        &mock.calls(),
        "POST /deployments/plan-1/start?RedeployOutdated=false&ContinueWithErrors=true",
    );
}

#[tokio::test]
async fn test_failed_deployment_stores_errors() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    mock.statuses("plan-1", &[("running", None), ("aborted", None)]);
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let outcome = pipeline
        .deploy_tags_with_manifest(
            &portal_manifest(),
            "Dev",
            "Test",
            false,
            DeployOptions::default(),
        )
        .await
        .expect("deploy");

    assert_eq!(outcome, DeployOutcome::Failed(DeploymentStatus::Aborted));
    let errors = assert_artifact(workspace.path(), CacheFile::DEPLOY_ERRORS);
    assert_eq!(errors["DeploymentStatus"], "aborted");
    assert!(!workspace.path().join(CacheFile::DEPLOYMENT_MANIFEST).exists());
}

#[tokio::test]
async fn test_deployment_times_out() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    mock.statuses("plan-1", &[("running", None)]);
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let outcome = pipeline
        .deploy_tags_with_manifest(
            &portal_manifest(),
            "Dev",
            "Test",
            false,
            DeployOptions::default(),
        )
        .await
        .expect("deploy");

    assert_eq!(outcome, DeployOutcome::TimedOut);
    assert_eq!(sleeper.calls().len(), 5);
}

#[tokio::test]
async fn test_stale_manifest_version_aborts() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let manifest = trigger_manifest(&[("Portal", "app-1", "vk-gone", "0.9")]);
    let outcome = pipeline
        .deploy_tags_with_manifest(&manifest, "Dev", "Test", false, DeployOptions::default())
        .await
        .expect("deploy");

    assert!(matches!(outcome, DeployOutcome::StaleManifest(_)), "got {outcome:?}");
    assert_eq!(outcome.exit_code(), 1);
}

#[tokio::test]
async fn test_latest_tags_wait_for_busy_queue() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    mock.existing_deployment("busy-1", "k-qa", &[("running", None)]);
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let outcome = pipeline
        .deploy_latest_tags(
            "Development",
            "QA",
            &["Portal".to_string()],
            None,
            DeployOptions::default(),
        )
        .await
        .expect("deploy");

    assert_eq!(outcome, DeployOutcome::QueueTimedOut);
    assert_eq!(sleeper.calls().len(), 2);
    assert_not_called(&mock.calls(), "POST /deployments");
}

#[tokio::test]
async fn test_latest_tags_parallel_skips_queue() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    mock.existing_deployment("busy-1", "k-qa", &[("running", None)])
        .statuses("plan-1", &[("finished_successful", None)]);
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let options = DeployOptions {
        allow_parallel: true,
        ..DeployOptions::default()
    };
    let outcome = pipeline
        .deploy_latest_tags("Development", "QA", &["Portal".to_string()], None, options)
        .await
        .expect("deploy");

    assert_eq!(outcome, DeployOutcome::Finished(DeploymentStatus::FinishedSuccessful));
    let manifest = assert_artifact(workspace.path(), CacheFile::DEPLOYMENT_MANIFEST);
    assert_eq!(manifest[0]["ChangeLog"], "Portal 1.1");
}

#[tokio::test]
async fn test_continue_resumes_prepared_deployment() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    mock.existing_deployment(
        "dep-9",
        "k-qa",
        &[
            ("needs_user_intervention", Some("deployment_prepared")),
            ("needs_user_intervention", Some("deployment_prepared")),
            ("running", None),
            ("finished_successful", None),
        ],
    );
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let outcome = pipeline.continue_deployment("QA").await.expect("continue");

    assert_eq!(outcome, DeployOutcome::Finished(DeploymentStatus::FinishedSuccessful));
    let continues = mock
        .calls()
        .iter()
        .filter(|call| *call == "POST /deployments/dep-9/continue")
        .count();
    assert_eq!(continues, 1);
}

#[tokio::test]
async fn test_continue_without_active_plan() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let outcome = pipeline.continue_deployment("QA").await.expect("continue");
    assert_eq!(outcome, DeployOutcome::NothingToContinue);
    assert_eq!(outcome.exit_code(), 0);
}

#[tokio::test]
async fn test_continue_rejects_unprepared_plan() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    mock.existing_deployment("dep-3", "k-qa", &[("running", None)]);
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let outcome = pipeline.continue_deployment("QA").await.expect("continue");
    assert_eq!(outcome, DeployOutcome::NotPrepared(DeploymentStatus::Running));
    assert_not_called(&mock.calls(), "POST /deployments/dep-3/continue");
    assert_not_called(&mock.calls(), "DELETE");
}

#[tokio::test]
async fn test_deploy_from_plan_writes_manifest_from_operations() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    mock.plan_info(
        "plan-7",
        json!([{"ApplicationKey": "app-1", "ApplicationVersionKey": "vk-2"}]),
        json!([]),
    )
    .statuses("plan-7", &[("needs_user_intervention", None), ("finished_successful", None)]);
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let outcome = pipeline.deploy_from_plan("plan-7", "QA").await.expect("deploy");

    assert_eq!(outcome, DeployOutcome::Finished(DeploymentStatus::FinishedSuccessful));
    assert_called(&mock.calls(), "POST /deployments/plan-7/continue");
    let manifest = assert_artifact(workspace.path(), CacheFile::DEPLOYMENT_MANIFEST);
    assert_eq!(
        manifest,
        json!([{
            "ApplicationName": "Portal",
            "ApplicationKey": "app-1",
            "Version": "1.1",
            "VersionKey": "vk-2",
            "ChangeLog": "Portal 1.1",
            "CreatedOn": "2026-10-01T10:00:00Z"
        }])
    );
}

#[tokio::test]
async fn test_deploy_from_plan_never_continues_with_conflicts() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    mock.plan_info("plan-7", json!([]), json!([{"ApplicationName": "Portal"}]));
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = ltd_common::PipelineConfig {
        allow_continue_with_errors: true,
        ..fast_config()
    };
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let outcome = pipeline.deploy_from_plan("plan-7", "QA").await.expect("deploy");
    assert_eq!(outcome, DeployOutcome::ConflictsAborted);
    assert_called(&mock.calls(), "DELETE /deployments/plan-7");
}

#[tokio::test]
async fn test_deploy_package_sends_binary() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    mock.statuses("plan-1", &[("finished_successful", None)]);
    let workspace = Workspace::new();
    let package = workspace.path().join("Portal.oap");
    std::fs::write(&package, b"package-bytes").unwrap();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);
    let destination = Named {
        name: "QA".into(),
        key: "k-qa".into(),
    };

    let outcome = pipeline
        .deploy_package(&destination, &package, DeployOptions::default())
        .await
        .expect("deploy");

    assert_eq!(outcome, DeployOutcome::Finished(DeploymentStatus::FinishedSuccessful));
    assert_called(&mock.calls(), "POST /environments/k-qa/deployments");
}

#[tokio::test]
async fn test_deploy_package_rejects_other_files() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);
    let destination = Named {
        name: "QA".into(),
        key: "k-qa".into(),
    };

    let err = pipeline
        .deploy_package(&destination, std::path::Path::new("Portal.zip"), DeployOptions::default())
        .await
        .unwrap_err();
    assert!(
        matches!(err, ltd_common::LifetimeError::InvalidOutSystemsPackage(_)),
        "got {err:?}"
    );
    assert!(mock.calls().is_empty());
}

/// Portal changed in QA on top of 1.0, with 1.0.1 and 1.0.2 already tagged.
async fn lifetime_with_modified_portal() -> MockLifetime {
    let mock = MockLifetime::start().await;
    mock.environment("k-dev", "Development")
        .environment("k-qa", "QA")
        .application(
            "app-1",
            "Portal",
            &[("vk-1", "1.0"), ("vk-3", "1.0.1"), ("vk-4", "1.0.2")],
            &[("k-qa", "vk-1")],
        )
        .application("app-2", "Backoffice", &[("vk-5", "2.0")], &[("k-qa", "vk-5")])
        .modified(
            "app-1",
            "k-qa",
            json!([
                {"NativePlatform": "Android", "VersionNumber": "1.0.0", "IsModified": true},
                {"NativePlatform": "iOS", "VersionNumber": "1.0.0", "IsModified": false}
            ]),
        );
    mock
}

fn app_names(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[tokio::test]
async fn test_tag_modified_apps_uses_next_free_version() {
    init_test_logging();
    crate::test_log!("TEST START: test_tag_modified_apps_uses_next_free_version");

    let mock = lifetime_with_modified_portal().await;
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let tagged = pipeline
        .tag_modified_apps("QA", &app_names(&["Portal", "Backoffice"]), "nightly build")
        .await
        .expect("tag");

    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].name, "Portal");
    assert_eq!(tagged[0].version, "1.0.3");
    assert_eq!(tagged[0].version_key, "app-1-1-0-3");
    assert_eq!(
        mock.tags(),
        vec![json!({
            "ChangeLog": "nightly build",
            "Version": "1.0.3",
            "MobileVersions": [{
                "NativePlatform": "Android",
                "VersionNumber": "1.0.1",
                "VersionDescription": "nightly build"
            }]
        })]
    );
    let calls = mock.calls();
    assert_called(&calls, "GET /applications/app-1/versions?MaximumVersionsToReturn=10");
    assert_called(&calls, "POST /environments/k-qa/applications/app-1/versions");
    assert_not_called(&calls, "GET /applications/app-2/versions");
    assert_not_called(&calls, "POST /environments/k-qa/applications/app-2");
    crate::test_log!("TEST PASS: test_tag_modified_apps_uses_next_free_version");
}

#[tokio::test]
async fn test_tag_modified_apps_gives_up_after_max_candidates() {
    init_test_logging();
    let mock = lifetime_with_modified_portal().await;
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = ltd_common::PipelineConfig {
        tag_app_max_retries: 2,
        max_versions_to_return: 3,
        ..fast_config()
    };
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let tagged = pipeline
        .tag_modified_apps("QA", &app_names(&["Portal"]), "nightly build")
        .await
        .expect("tag");

    assert!(tagged.is_empty());
    assert!(mock.tags().is_empty());
    assert_called(&mock.calls(), "GET /applications/app-1/versions?MaximumVersionsToReturn=3");
}

#[tokio::test]
async fn test_tag_modified_apps_makes_one_attempt_on_server_error() {
    init_test_logging();
    let mock = lifetime_with_modified_portal().await;
    mock.fail_tags(StatusCode::INTERNAL_SERVER_ERROR);
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let err = pipeline
        .tag_modified_apps("QA", &app_names(&["Portal"]), "nightly build")
        .await
        .unwrap_err();

    assert!(matches!(err, LifetimeError::ServerError(_)), "got {err:?}");
    assert_eq!(mock.tags().len(), 1);
    assert!(sleeper.calls().is_empty());
}

#[tokio::test]
async fn test_tag_modified_apps_ignores_unknown_and_unchanged_apps() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let tagged = pipeline
        .tag_modified_apps("QA", &app_names(&["Portal", " Ghost ", ""]), "nightly build")
        .await
        .expect("tag");

    assert!(tagged.is_empty());
    assert!(mock.tags().is_empty());
    assert_not_called(&mock.calls(), "GET /applications/app-1/versions");
}

#[tokio::test]
async fn test_start_saved_plan_writes_manifest_and_runs_to_the_end() {
    init_test_logging();
    crate::test_log!("TEST START: test_start_saved_plan_writes_manifest_and_runs_to_the_end");

    let mock = lifetime_with_portal().await;
    mock.existing_deployment(
        "dep-5",
        "k-qa",
        &[
            ("saved", None),
            ("needs_user_intervention", None),
            ("finished_successful", None),
        ],
    )
    .plan_info(
        "dep-5",
        json!([{"ApplicationKey": "app-1", "ApplicationVersionKey": "vk-2"}]),
        json!([]),
    );
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let outcome = pipeline.start_saved_plan("QA").await.expect("start");

    assert_eq!(outcome, DeployOutcome::Finished(DeploymentStatus::FinishedSuccessful));
    let calls = mock.calls();
    assert_called(&calls, "POST /deployments/dep-5/start?RedeployOutdated=true");
    let continues = calls
        .iter()
        .filter(|call| *call == "POST /deployments/dep-5/continue")
        .count();
    assert_eq!(continues, 1);
    assert_not_called(&calls, "DELETE");
    assert!(!calls.iter().any(|call| call == "POST /deployments"));

    let manifest = assert_artifact(workspace.path(), CacheFile::DEPLOYMENT_MANIFEST);
    assert_eq!(manifest[0]["ApplicationName"], "Portal");
    assert_eq!(manifest[0]["Version"], "1.1");
    crate::test_log!("TEST PASS: test_start_saved_plan_writes_manifest_and_runs_to_the_end");
}

#[tokio::test]
async fn test_start_saved_plan_keeps_plan_with_conflicts() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    mock.existing_deployment("dep-5", "k-qa", &[("saved", None)])
        .plan_info("dep-5", json!([]), json!([{"ApplicationName": "Portal"}]));
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = ltd_common::PipelineConfig {
        allow_continue_with_errors: true,
        ..fast_config()
    };
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let outcome = pipeline.start_saved_plan("QA").await.expect("start");

    assert_eq!(outcome, DeployOutcome::ConflictsKept);
    assert_eq!(outcome.exit_code(), 1);
    let calls = mock.calls();
    assert_not_called(&calls, "DELETE");
    assert_not_called(&calls, "POST /deployments/dep-5/start");
    let conflicts = assert_artifact(workspace.path(), CacheFile::CONFLICTS);
    assert_eq!(conflicts[0]["ApplicationName"], "Portal");
    assert!(!workspace.path().join(CacheFile::DEPLOYMENT_MANIFEST).exists());
}

#[tokio::test]
async fn test_start_saved_plan_requires_a_saved_plan() {
    init_test_logging();
    let mock = lifetime_with_portal().await;
    mock.existing_deployment("dep-6", "k-qa", &[("running", None)])
        .existing_deployment("dep-7", "k-dev", &[("saved", None)]);
    let workspace = Workspace::new();
    let lifetime = mock.lifetime(workspace.path());
    let config = fast_config();
    let sleeper = InstantSleeper::default();
    let pipeline = Pipeline::new(&lifetime, &config, &sleeper);

    let err = pipeline.start_saved_plan("QA").await.unwrap_err();

    assert!(matches!(err, LifetimeError::NoDeployments(_)), "got {err:?}");
    assert_not_called(&mock.calls(), "GET /deployments/dep-7/status");
    assert_not_called(&mock.calls(), "POST /deployments/dep-6/start");
}
