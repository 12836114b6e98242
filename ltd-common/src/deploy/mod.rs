//! Deployment orchestration.
//!
//! - [`plan`]: which application versions go into a plan, and running it
//!   through conflicts and start
//! - [`poll`]: waiting for a free queue and for a started plan to finish
//! - [`flow`]: the end-to-end pipeline steps and their exit codes
//! - [`packages`]: OAP export and dependency-first deployment order
//!
//! Everything here talks to LifeTime through [`DeploymentApi`] and waits
//! through [`Sleeper`], so the state machine runs against fakes in tests.

pub mod flow;
pub mod packages;
pub mod plan;
pub mod poll;
pub mod status;

pub use flow::{DeployOptions, DeployOutcome, DeployRequest, Pipeline, TaggedApp};
pub use packages::{DependencySource, OapEntry, PackageSource};
pub use plan::{
    AppToDeploy, DeployAppKey, PlanExecution, PlanOutcome, TargetLookup, check_if_can_deploy,
    execute_plan,
};
pub use poll::{
    OnWaiting, PollOutcome, PollPolicy, QueueOutcome, QueuePolicy, poll_deployment,
    wait_for_free_queue,
};
pub use status::DeploymentStatus;

use crate::endpoint::ApiVersion;
use crate::errors::Result;
use crate::lifetime::{Deployment, DeploymentInfo, Lifetime, StartOptions};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

/// Deployment-plan operations the orchestration needs.
#[async_trait]
pub trait DeploymentApi: Send + Sync {
    fn api_version(&self) -> ApiVersion;

    /// Raw status payload of a plan.
    async fn status(&self, key: &str) -> Result<Value>;

    async fn continue_(&self, key: &str) -> Result<()>;

    async fn info(&self, key: &str) -> Result<DeploymentInfo>;

    async fn start(&self, key: &str, options: StartOptions) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Active plans targeting an environment.
    async fn running_deployments(&self, env_key: &str) -> Result<Vec<Deployment>>;

    /// Persist a JSON artifact next to the API caches.
    fn store_artifact(&self, name: &str, data: &Value) -> Result<()>;
}

#[async_trait]
impl DeploymentApi for Lifetime {
    fn api_version(&self) -> ApiVersion {
        Lifetime::api_version(self)
    }

    async fn status(&self, key: &str) -> Result<Value> {
        self.get_deployment_status_raw(key).await
    }

    async fn continue_(&self, key: &str) -> Result<()> {
        self.continue_deployment(key).await
    }

    async fn info(&self, key: &str) -> Result<DeploymentInfo> {
        self.get_deployment_info(key).await
    }

    async fn start(&self, key: &str, options: StartOptions) -> Result<()> {
        self.start_deployment(key, options).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.delete_deployment(key).await
    }

    async fn running_deployments(&self, env_key: &str) -> Result<Vec<Deployment>> {
        self.get_running_deployment(env_key).await
    }

    fn store_artifact(&self, name: &str, data: &Value) -> Result<()> {
        self.store().store(name, data).map(|_| ())
    }
}

/// Waits between polls.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, period: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, period: Duration) {
        tokio::time::sleep(period).await;
    }
}

/// Returns immediately and records every requested period.
#[derive(Debug, Default)]
pub struct InstantSleeper {
    calls: Mutex<Vec<Duration>>,
}

impl InstantSleeper {
    pub fn calls(&self) -> Vec<Duration> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, period: Duration) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(period);
        }
    }
}
