//! Queue wait and the deployment poll loop.

use super::{DeploymentApi, DeploymentStatus, Sleeper};
use crate::cache::CacheFile;
use crate::config::PipelineConfig;
use crate::errors::Result;
use crate::lifetime::decode;
use crate::lifetime::deployments::check_two_step_status;
use crate::lifetime::types::DeploymentStatusReport;
use crate::util::humanize_duration;
use std::time::Duration;
use tracing::{error, info, warn};

/// What to do when a plan stops in `needs_user_intervention`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnWaiting {
    /// Continue unconditionally.
    AutoContinue,
    /// Stop after the prepare step of a two-step deployment unless `force`.
    TwoStep { force: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub deployment_timeout: Duration,
    pub sleep_period: Duration,
    pub on_waiting: OnWaiting,
}

impl PollPolicy {
    pub fn from_config(config: &PipelineConfig, on_waiting: OnWaiting) -> Self {
        Self {
            deployment_timeout: config.deployment_timeout(),
            sleep_period: config.sleep_period(),
            on_waiting,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Left the running state with a non-error status.
    Finished(DeploymentStatus),
    /// Prepare step of a two-step deployment is done.
    FirstStepFinished,
    /// Ended in an error state; the payload was stored as `DeploymentErrors`.
    Failed(DeploymentStatus),
    TimedOut,
}

/// Poll `key` until it ends, continuing or stopping on waits per `policy`.
pub async fn poll_deployment(
    api: &dyn DeploymentApi,
    sleeper: &dyn Sleeper,
    key: &str,
    policy: &PollPolicy,
) -> Result<PollOutcome> {
    let mut elapsed = Duration::ZERO;
    let mut alerted = false;
    while elapsed < policy.deployment_timeout {
        let raw = api.status(key).await?;
        let report: DeploymentStatusReport = decode(raw.clone(), key)?;
        let status = DeploymentStatus::from(report.deployment_status.as_str());

        if !status.is_running() {
            if status.is_waiting() {
                match policy.on_waiting {
                    OnWaiting::AutoContinue => {
                        api.continue_(key).await?;
                        info!(deployment_key = key, "deployment plan resumed execution");
                    }
                    OnWaiting::TwoStep { force } if check_two_step_status(&report) => {
                        if !force {
                            info!(
                                deployment_key = key,
                                "deployment plan first step finished successfully"
                            );
                            return Ok(PollOutcome::FirstStepFinished);
                        }
                        api.continue_(key).await?;
                        info!(deployment_key = key, "deployment plan resumed execution");
                    }
                    OnWaiting::TwoStep { .. } => {
                        if !alerted {
                            alerted = true;
                            warn!(
                                deployment_key = key,
                                "a manual intervention is required to continue \
                                 the execution of the deployment plan"
                            );
                        }
                    }
                }
            } else if status.is_error() {
                error!(deployment_key = key, %status, "deployment plan finished with errors");
                api.store_artifact(CacheFile::DEPLOY_ERRORS, &raw)?;
                return Ok(PollOutcome::Failed(status));
            } else {
                info!(deployment_key = key, %status, "deployment plan finished");
                return Ok(PollOutcome::Finished(status));
            }
        }

        sleeper.sleep(policy.sleep_period).await;
        elapsed += policy.sleep_period;
        info!(
            deployment_key = key,
            elapsed_secs = elapsed.as_secs(),
            "{} have passed since the deployment started",
            humanize_duration(elapsed)
        );
    }
    error!(deployment_key = key, "timeout occurred while the deployment plan is still running");
    Ok(PollOutcome::TimedOut)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePolicy {
    pub queue_timeout: Duration,
    pub sleep_period: Duration,
}

impl QueuePolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            queue_timeout: config.queue_timeout(),
            sleep_period: config.sleep_period(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    Free,
    TimedOut,
}

/// Wait until no plan is active on `env_key`.
pub async fn wait_for_free_queue(
    api: &dyn DeploymentApi,
    sleeper: &dyn Sleeper,
    env_key: &str,
    policy: &QueuePolicy,
) -> Result<QueueOutcome> {
    let mut elapsed = Duration::ZERO;
    loop {
        let running = api.running_deployments(env_key).await?;
        if running.is_empty() {
            return Ok(QueueOutcome::Free);
        }
        if elapsed >= policy.queue_timeout {
            error!(env = env_key, "timeout occurred while waiting for LifeTime to be free");
            return Ok(QueueOutcome::TimedOut);
        }
        sleeper.sleep(policy.sleep_period).await;
        elapsed += policy.sleep_period;
        info!(
            env = env_key,
            active = running.len(),
            elapsed_secs = elapsed.as_secs(),
            "waiting for LifeTime to be free"
        );
    }
}
