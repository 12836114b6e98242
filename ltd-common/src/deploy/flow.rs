//! End-to-end pipeline steps.
//!
//! Each step resolves what to deploy, waits for the target queue, creates
//! and starts the plan, then polls it. The result is a [`DeployOutcome`]
//! the CLI turns into a process exit code; API and lookup failures are
//! returned as errors instead.

use super::plan::{AppToDeploy, PlanExecution, PlanOutcome, check_if_can_deploy, execute_plan};
use super::poll::{
    OnWaiting, PollOutcome, PollPolicy, QueueOutcome, QueuePolicy, poll_deployment,
    wait_for_free_queue,
};
use super::{DeployAppKey, DeploymentStatus, Sleeper};
use crate::cache::CacheFile;
use crate::config::PipelineConfig;
use crate::errors::{ErrorCode, LifetimeError, Result};
use crate::lifetime::deployments::check_two_step_status;
use crate::lifetime::{
    AppRef, AppStatusInEnv, ApplicationOperation, EnvRef, Lifetime, MobileVersion, Named,
    StartOptions,
};
use crate::manifest::{DeployedApplication, DeploymentManifest, TriggerManifest};
use crate::util::is_valid_os_package;
use crate::version::next_version;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// How a pipeline step ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    Finished(DeploymentStatus),
    /// Prepare step of a two-step deployment is done; continue later.
    FirstStepFinished,
    /// The target already runs every requested version.
    Skipped,
    /// `continue-deployment` found no active plan.
    NothingToContinue,
    Failed(DeploymentStatus),
    TimedOut,
    QueueTimedOut,
    ConflictsAborted,
    /// A saved plan had conflicts and was left for a person to resolve.
    ConflictsKept,
    /// The active plan is not a prepared two-step deployment.
    NotPrepared(DeploymentStatus),
    /// A manifest version no longer exists in the source environment.
    StaleManifest(String),
}

impl DeployOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Finished(_)
            | Self::FirstStepFinished
            | Self::Skipped
            | Self::NothingToContinue => 0,
            Self::Failed(_)
            | Self::TimedOut
            | Self::QueueTimedOut
            | Self::ConflictsAborted
            | Self::ConflictsKept
            | Self::NotPrepared(_)
            | Self::StaleManifest(_) => 1,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }

    /// Catalog entry for a failed step.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Finished(_)
            | Self::FirstStepFinished
            | Self::Skipped
            | Self::NothingToContinue => None,
            Self::Failed(_) => Some(ErrorCode::DeploymentFailed),
            Self::TimedOut => Some(ErrorCode::DeploymentTimedOut),
            Self::QueueTimedOut => Some(ErrorCode::DeploymentQueueTimedOut),
            Self::ConflictsAborted | Self::ConflictsKept => Some(ErrorCode::DeploymentConflicts),
            Self::NotPrepared(_) => Some(ErrorCode::DeploymentNotPrepared),
            Self::StaleManifest(_) => Some(ErrorCode::LookupAppDoesNotExist),
        }
    }
}

impl From<PollOutcome> for DeployOutcome {
    fn from(outcome: PollOutcome) -> Self {
        match outcome {
            PollOutcome::Finished(status) => Self::Finished(status),
            PollOutcome::FirstStepFinished => Self::FirstStepFinished,
            PollOutcome::Failed(status) => Self::Failed(status),
            PollOutcome::TimedOut => Self::TimedOut,
        }
    }
}

impl fmt::Display for DeployOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finished(status) => write!(f, "deployment finished with status {status}"),
            Self::FirstStepFinished => {
                f.write_str("first step of the two-step deployment finished")
            }
            Self::Skipped => f.write_str("deployment skipped, target already up to date"),
            Self::NothingToContinue => f.write_str("no deployment to continue"),
            Self::Failed(status) => write!(f, "deployment failed with status {status}"),
            Self::TimedOut => f.write_str("timed out waiting for the deployment"),
            Self::QueueTimedOut => f.write_str("timed out waiting for LifeTime to be free"),
            Self::ConflictsAborted => f.write_str("deployment plan had conflicts and was deleted"),
            Self::ConflictsKept => {
                f.write_str("deployment plan has conflicts and was left unstarted")
            }
            Self::NotPrepared(status) => {
                write!(f, "deployment is not in 'Prepared' status (status {status})")
            }
            Self::StaleManifest(app) => write!(f, "manifest version of {app} no longer exists"),
        }
    }
}

/// Flags shared by the plan-creating steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeployOptions {
    pub force_two_step: bool,
    pub allow_parallel: bool,
    pub include_deployment_zones: bool,
}

/// Applications and environments of one plan.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub source: Named,
    pub destination: Named,
    pub apps: Vec<AppToDeploy>,
    pub notes: String,
}

/// Application version created by [`Pipeline::tag_modified_apps`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedApp {
    pub name: String,
    pub version: String,
    pub version_key: String,
}

/// A LifeTime connection, its tunables and the poll clock.
pub struct Pipeline<'a> {
    pub lifetime: &'a Lifetime,
    pub config: &'a PipelineConfig,
    pub sleeper: &'a dyn Sleeper,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        lifetime: &'a Lifetime,
        config: &'a PipelineConfig,
        sleeper: &'a dyn Sleeper,
    ) -> Self {
        Self {
            lifetime,
            config,
            sleeper,
        }
    }

    fn poll_policy(&self, on_waiting: OnWaiting) -> PollPolicy {
        PollPolicy::from_config(self.config, on_waiting)
    }

    fn execution(&self) -> PlanExecution {
        PlanExecution {
            allow_continue_with_errors: self.config.allow_continue_with_errors,
            redeploy_outdated: self.config.redeploy_outdated_apps,
        }
    }

    async fn wait_for_queue(&self, env_key: &str) -> Result<QueueOutcome> {
        wait_for_free_queue(
            self.lifetime,
            self.sleeper,
            env_key,
            &QueuePolicy::from_config(self.config),
        )
        .await
    }

    /// Deploy the versions running in `source` to `destination`.
    ///
    /// With a deployment manifest, only its entries named in `app_names`
    /// are deployed, at the versions it pins.
    pub async fn deploy_latest_tags(
        &self,
        source: &str,
        destination: &str,
        app_names: &[String],
        deployment_manifest: Option<&DeploymentManifest>,
        options: DeployOptions,
    ) -> Result<DeployOutcome> {
        let source = self.lifetime.resolve_environment(EnvRef::Name(source)).await?;
        let destination = self
            .lifetime
            .resolve_environment(EnvRef::Name(destination))
            .await?;
        let apps = match deployment_manifest {
            Some(manifest) => apps_from_deployment_manifest(manifest, app_names),
            None => {
                self.running_apps(&source, app_names, options.include_deployment_zones)
                    .await?
            }
        };
        let request = DeployRequest {
            source,
            destination,
            apps,
            notes: self.config.deployment_note.clone(),
        };
        self.deploy_apps(request, options).await
    }

    /// Deploy the versions a trigger manifest pins, between two of its labels.
    pub async fn deploy_tags_with_manifest(
        &self,
        manifest: &TriggerManifest,
        source_label: &str,
        destination_label: &str,
        include_test_apps: bool,
        options: DeployOptions,
    ) -> Result<DeployOutcome> {
        let source = manifest.environment_details(source_label)?;
        let destination = manifest.environment_details(destination_label)?;
        let apps = match self
            .manifest_apps(
                manifest,
                &source,
                include_test_apps,
                options.include_deployment_zones,
            )
            .await
        {
            Ok(apps) => apps,
            Err(LifetimeError::AppDoesNotExist(message)) => {
                error!(
                    src_env = %source.name,
                    %message,
                    "the manifest no longer reflects the source environment, aborting"
                );
                return Ok(DeployOutcome::StaleManifest(message));
            }
            Err(err) => return Err(err),
        };
        let request = DeployRequest {
            source,
            destination,
            apps,
            notes: manifest.deployment_notes().to_string(),
        };
        self.deploy_apps(request, options).await
    }

    /// Filter, queue, create, execute and poll a plan with two-step handling.
    pub async fn deploy_apps(
        &self,
        request: DeployRequest,
        options: DeployOptions,
    ) -> Result<DeployOutcome> {
        let version = self.lifetime.api_version();
        let keys = check_if_can_deploy(
            self.lifetime,
            version,
            &request.destination.key,
            &request.destination.name,
            &request.apps,
            options.include_deployment_zones,
        )
        .await?;
        if keys.is_empty() {
            info!(
                env = %request.destination.name,
                "deployment skipped because the environment already has \
                 the target applications deployed with the same tags"
            );
            return Ok(DeployOutcome::Skipped);
        }

        let deploying = deploying_apps(&request.apps, &keys);
        let names: Vec<&str> = deploying.iter().map(|app| app.name.as_str()).collect();
        info!(
            src_env = %request.source.name,
            dst_env = %request.destination.name,
            apps = ?names,
            "creating deployment plan"
        );

        if !options.allow_parallel
            && self.wait_for_queue(&request.destination.key).await? == QueueOutcome::TimedOut
        {
            return Ok(DeployOutcome::QueueTimedOut);
        }

        let plan_key = self
            .lifetime
            .send_deployment(
                &keys,
                &request.notes,
                &request.source.name,
                &request.destination.name,
            )
            .await?;
        if self.execute(&plan_key, self.execution()).await? == PlanOutcome::ConflictsAborted {
            return Ok(DeployOutcome::ConflictsAborted);
        }

        let policy = self.poll_policy(OnWaiting::TwoStep {
            force: options.force_two_step,
        });
        let outcome = DeployOutcome::from(
            poll_deployment(self.lifetime, self.sleeper, &plan_key, &policy).await?,
        );
        if outcome.is_success() {
            let manifest: DeploymentManifest =
                deploying.iter().map(|app| app.deployed()).collect();
            self.store_deployment_manifest(&manifest)?;
        }
        Ok(outcome)
    }

    /// Resume a prepared two-step deployment on `destination`.
    pub async fn continue_deployment(&self, destination: &str) -> Result<DeployOutcome> {
        let env_key = self.lifetime.get_environment_key(destination).await?;
        let running = self.lifetime.get_running_deployment(&env_key).await?;
        let Some(deployment) = running.first() else {
            info!(env = destination, "there are no deployments to continue");
            return Ok(DeployOutcome::NothingToContinue);
        };
        let key = deployment.key.as_str();
        let report = self.lifetime.get_deployment_status(key).await?;
        let status = DeploymentStatus::from(report.deployment_status.as_str());
        if !(status.is_waiting() && check_two_step_status(&report)) {
            error!(deployment_key = key, %status, "deployment plan is not in 'Prepared' status");
            return Ok(DeployOutcome::NotPrepared(status));
        }

        self.lifetime.continue_deployment(key).await?;
        info!(deployment_key = key, "deployment plan resumed execution");
        let policy = self.poll_policy(OnWaiting::AutoContinue);
        Ok(poll_deployment(self.lifetime, self.sleeper, key, &policy)
            .await?
            .into())
    }

    /// Deploy an `.osp`/`.oap` package file to `destination`.
    pub async fn deploy_package(
        &self,
        destination: &Named,
        package: &Path,
        options: DeployOptions,
    ) -> Result<DeployOutcome> {
        if !is_valid_os_package(package) {
            return Err(LifetimeError::InvalidOutSystemsPackage(format!(
                "{} is not an .osp or .oap file",
                package.display()
            )));
        }
        if !options.allow_parallel
            && self.wait_for_queue(&destination.key).await? == QueueOutcome::TimedOut
        {
            return Ok(DeployOutcome::QueueTimedOut);
        }
        let plan_key = self
            .lifetime
            .send_binary_deployment(&destination.key, package)
            .await?;
        if self.execute(&plan_key, self.execution()).await? == PlanOutcome::ConflictsAborted {
            return Ok(DeployOutcome::ConflictsAborted);
        }
        let policy = self.poll_policy(OnWaiting::TwoStep {
            force: options.force_two_step,
        });
        Ok(poll_deployment(self.lifetime, self.sleeper, &plan_key, &policy)
            .await?
            .into())
    }

    /// Run an existing plan; on success record what it deployed.
    pub async fn deploy_from_plan(
        &self,
        plan_key: &str,
        destination: &str,
    ) -> Result<DeployOutcome> {
        let execution = PlanExecution {
            allow_continue_with_errors: false,
            ..self.execution()
        };
        if self.execute(plan_key, execution).await? == PlanOutcome::ConflictsAborted {
            return Ok(DeployOutcome::ConflictsAborted);
        }
        let policy = self.poll_policy(OnWaiting::AutoContinue);
        let outcome = DeployOutcome::from(
            poll_deployment(self.lifetime, self.sleeper, plan_key, &policy).await?,
        );
        if outcome.is_success() {
            let manifest = self.plan_manifest(plan_key).await?;
            info!(
                deployment_key = plan_key,
                env = destination,
                apps = manifest.len(),
                "deployment manifest written"
            );
            self.store_deployment_manifest(&manifest)?;
        }
        Ok(outcome)
    }

    /// Start the plan saved for `destination` and follow it to the end.
    ///
    /// A plan with conflicts is not started and not deleted. Otherwise its
    /// deployment manifest is written before the plan starts.
    pub async fn start_saved_plan(&self, destination: &str) -> Result<DeployOutcome> {
        let env_key = self.lifetime.get_environment_key(destination).await?;
        let Some(plan) = self.lifetime.get_saved_deployment(&env_key).await? else {
            return Err(LifetimeError::NoDeployments(format!(
                "Unable to find a created deployment plan for {destination} environment"
            )));
        };
        let key = plan.key.as_str();
        info!(deployment_key = key, env = destination, "deployment plan found");

        let info = self.lifetime.get_deployment_info(key).await?;
        if !info.application_conflicts.is_empty() {
            self.lifetime
                .store()
                .store(CacheFile::CONFLICTS, &info.application_conflicts)?;
            error!(
                deployment_key = key,
                artifact = CacheFile::CONFLICTS,
                "deployment plan has conflicts and will not be started"
            );
            return Ok(DeployOutcome::ConflictsKept);
        }

        let manifest = self
            .operations_manifest(&info.deployment.application_operations)
            .await?;
        self.store_deployment_manifest(&manifest)?;
        self.lifetime
            .start_deployment(key, StartOptions::redeploy(self.config.redeploy_outdated_apps))
            .await?;
        info!(deployment_key = key, "deployment plan started being executed");

        let policy = self.poll_policy(OnWaiting::AutoContinue);
        Ok(poll_deployment(self.lifetime, self.sleeper, key, &policy)
            .await?
            .into())
    }

    /// Deployment manifest of the application operations in a plan.
    pub async fn plan_manifest(&self, plan_key: &str) -> Result<DeploymentManifest> {
        let info = self.lifetime.get_deployment_info(plan_key).await?;
        self.operations_manifest(&info.deployment.application_operations)
            .await
    }

    async fn operations_manifest(
        &self,
        operations: &[ApplicationOperation],
    ) -> Result<DeploymentManifest> {
        let mut manifest = Vec::with_capacity(operations.len());
        for operation in operations {
            let app = self
                .lifetime
                .get_application_data(AppRef::Key(&operation.application_key), false)
                .await?;
            let version = self
                .lifetime
                .get_application_version(
                    AppRef::Key(&operation.application_key),
                    &operation.application_version_key,
                )
                .await?;
            manifest.push(DeployedApplication {
                application_name: app.name,
                application_key: operation.application_key.clone(),
                version: version.version,
                version_key: operation.application_version_key.clone(),
                change_log: version.change_log,
                created_on: version.created_on,
            });
        }
        Ok(manifest)
    }

    /// Tag the deployment-manifest versions of `app_names` in `destination`.
    pub async fn tag_apps(
        &self,
        destination: &str,
        app_names: &[String],
        manifest: &DeploymentManifest,
    ) -> Result<usize> {
        let env_key = self.lifetime.get_environment_key(destination).await?;
        let mut tagged = 0;
        for app in manifest
            .iter()
            .filter(|app| app_names.iter().any(|name| name.trim() == app.application_name))
        {
            self.lifetime
                .set_application_version(
                    &env_key,
                    &app.application_key,
                    app.change_log.as_deref().unwrap_or_default(),
                    &app.version,
                    &[],
                )
                .await?;
            info!(
                app = %app.application_name,
                version = %app.version,
                env = destination,
                "application successfully tagged"
            );
            tagged += 1;
        }
        Ok(tagged)
    }

    /// Give every application in `app_names` with unreleased changes in
    /// `destination` a new version tag.
    ///
    /// The tag is the first revision after the running version that is not
    /// among the latest `max_versions_to_return` tags, trying at most
    /// `tag_app_max_retries` candidates. Modified native shells get the next
    /// revision of their own version.
    pub async fn tag_modified_apps(
        &self,
        destination: &str,
        app_names: &[String],
        change_log: &str,
    ) -> Result<Vec<TaggedApp>> {
        let env_key = self.lifetime.get_environment_key(destination).await?;
        let apps = self.lifetime.get_applications(true).await?;
        let mut tagged = Vec::new();
        for name in app_names
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
        {
            let Some(app) = apps.iter().find(|app| app.name == name) else {
                warn!(app = name, "application not found, not tagging it");
                continue;
            };
            let Some(status) = app.status_in(&env_key).filter(|status| status.is_modified) else {
                debug!(app = name, env = destination, "application has no changes to tag");
                continue;
            };

            let running = self
                .lifetime
                .get_running_app_version(&env_key, AppRef::Key(&app.key))
                .await?;
            let history: Vec<String> = self
                .lifetime
                .get_application_versions(AppRef::Key(&app.key), self.config.max_versions_to_return)
                .await?
                .into_iter()
                .map(|version| version.version)
                .collect();
            let Some(version) =
                free_version(&running.version, &history, self.config.tag_app_max_retries)?
            else {
                warn!(
                    app = name,
                    running = %running.version,
                    candidates = self.config.tag_app_max_retries,
                    "could not find an available tag for application"
                );
                continue;
            };

            let mobile = mobile_versions(status, change_log)?;
            let version_key = self
                .lifetime
                .set_application_version(&env_key, &app.key, change_log, &version, &mobile)
                .await?;
            info!(
                app = name,
                version = %version,
                env = destination,
                "application successfully tagged"
            );
            tagged.push(TaggedApp {
                name: app.name.clone(),
                version,
                version_key,
            });
        }
        Ok(tagged)
    }

    /// Every manifest application must exist and have a status in `environment`.
    pub async fn validate_manifest_apps(
        &self,
        manifest: &TriggerManifest,
        environment: &Named,
        include_test_apps: bool,
    ) -> Result<()> {
        let apps = self.lifetime.get_applications(true).await?;
        info!("applications data retrieved successfully");
        for wanted in manifest.applications(include_test_apps) {
            let app = apps
                .iter()
                .find(|app| app.name == wanted.application_name)
                .ok_or_else(|| {
                    LifetimeError::AppDoesNotExist(format!(
                        "Application '{}' not found in this infra",
                        wanted.application_name
                    ))
                })?;
            if app.status_in(&environment.key).is_none() {
                return Err(LifetimeError::AppDoesNotExist(format!(
                    "Application '{}' does not exist in '{}' environment",
                    app.name, environment.name
                )));
            }
        }
        info!(env = %environment.name, "all manifest applications exist in the environment");
        Ok(())
    }

    /// Versions running in `source`, with their zone names when asked.
    pub async fn running_apps(
        &self,
        source: &Named,
        app_names: &[String],
        include_deployment_zones: bool,
    ) -> Result<Vec<AppToDeploy>> {
        let zones: BTreeMap<String, String> = if include_deployment_zones {
            self.lifetime
                .get_environment_deployment_zones(EnvRef::Key(&source.key))
                .await?
                .into_iter()
                .map(|zone| (zone.key, zone.name))
                .collect()
        } else {
            BTreeMap::new()
        };
        let mut apps = Vec::with_capacity(app_names.len());
        for name in app_names.iter().map(|name| name.trim()).filter(|name| !name.is_empty()) {
            let running = self
                .lifetime
                .get_running_app_version(&source.key, AppRef::Name(name))
                .await?;
            let zone = running
                .deployment_zone_key
                .as_ref()
                .and_then(|key| zones.get(key).cloned());
            let mut app = AppToDeploy::from(running);
            app.deployment_zone = zone;
            apps.push(app);
        }
        Ok(apps)
    }

    /// Trigger-manifest versions, each checked to still exist in `source`.
    pub async fn manifest_apps(
        &self,
        manifest: &TriggerManifest,
        source: &Named,
        include_test_apps: bool,
        include_deployment_zones: bool,
    ) -> Result<Vec<AppToDeploy>> {
        let mut apps = Vec::new();
        for app in manifest.applications(include_test_apps) {
            match self
                .lifetime
                .get_application_version(AppRef::Name(&app.application_name), &app.version_key)
                .await
            {
                Ok(_) => {}
                Err(LifetimeError::AppDoesNotExist(_)) => {
                    warn!(
                        app = %app.application_name,
                        version = %app.version_number,
                        src_env = %source.name,
                        "application version no longer exists"
                    );
                    return Err(LifetimeError::AppDoesNotExist(format!(
                        "{} {}",
                        app.application_name, app.version_number
                    )));
                }
                Err(err) => return Err(err),
            }
            apps.push(AppToDeploy::from_manifest(app, include_deployment_zones));
        }
        Ok(apps)
    }

    async fn execute(&self, plan_key: &str, execution: PlanExecution) -> Result<PlanOutcome> {
        execute_plan(self.lifetime, plan_key, execution).await
    }

    fn store_deployment_manifest(&self, manifest: &DeploymentManifest) -> Result<()> {
        self.lifetime
            .store()
            .store(CacheFile::DEPLOYMENT_MANIFEST, manifest)?;
        Ok(())
    }
}

/// Entries of a deployment manifest named in `app_names`.
pub fn apps_from_deployment_manifest(
    manifest: &DeploymentManifest,
    app_names: &[String],
) -> Vec<AppToDeploy> {
    manifest
        .iter()
        .filter(|app| app_names.iter().any(|name| name.trim() == app.application_name))
        .map(AppToDeploy::from)
        .collect()
}

/// First revision after `running` missing from `history`.
///
/// `None` once `max_candidates` numbers were all taken.
fn free_version(running: &str, history: &[String], max_candidates: u32) -> Result<Option<String>> {
    let mut candidate = bump(running)?;
    for _ in 0..max_candidates {
        if !history.contains(&candidate) {
            return Ok(Some(candidate));
        }
        candidate = bump(&candidate)?;
    }
    Ok(None)
}

fn bump(version: &str) -> Result<String> {
    next_version(version).ok_or_else(|| {
        LifetimeError::InvalidParameters(format!(
            "Cannot derive a new version number from '{version}'"
        ))
    })
}

fn mobile_versions(status: &AppStatusInEnv, description: &str) -> Result<Vec<MobileVersion>> {
    status
        .mobile_apps_status
        .iter()
        .filter(|shell| shell.is_modified)
        .map(|shell| {
            Ok(MobileVersion {
                native_platform: shell.native_platform.clone(),
                version_number: bump(&shell.version_number)?,
                version_description: description.to_string(),
            })
        })
        .collect()
}

fn deploying_apps<'a>(apps: &'a [AppToDeploy], keys: &[DeployAppKey]) -> Vec<&'a AppToDeploy> {
    apps.iter()
        .filter(|app| keys.iter().any(|key| key.version_key() == app.version_key))
        .collect()
}
