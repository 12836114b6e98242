//! Deployment plan execution states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution state reported by `deployments/{key}/status`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeploymentStatus {
    Saved,
    Running,
    NeedsUserIntervention,
    Aborting,
    Aborted,
    FinishedWithErrors,
    FinishedSuccessful,
    FinishedWithWarnings,
    /// Anything LifeTime adds later; treated as a successful end state.
    Other(String),
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Saved => "saved",
            Self::Running => "running",
            Self::NeedsUserIntervention => "needs_user_intervention",
            Self::Aborting => "aborting",
            Self::Aborted => "aborted",
            Self::FinishedWithErrors => "finished_with_errors",
            Self::FinishedSuccessful => "finished_successful",
            Self::FinishedWithWarnings => "finished_with_warnings",
            Self::Other(other) => other,
        }
    }

    /// Occupies the deployment queue of the target environment.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Saved | Self::Running | Self::NeedsUserIntervention | Self::Aborting
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Aborted | Self::FinishedWithErrors)
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::NeedsUserIntervention)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl From<&str> for DeploymentStatus {
    fn from(value: &str) -> Self {
        match value {
            "saved" => Self::Saved,
            "running" => Self::Running,
            "needs_user_intervention" => Self::NeedsUserIntervention,
            "aborting" => Self::Aborting,
            "aborted" => Self::Aborted,
            "finished_with_errors" => Self::FinishedWithErrors,
            "finished_successful" => Self::FinishedSuccessful,
            "finished_with_warnings" => Self::FinishedWithWarnings,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for DeploymentStatus {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<DeploymentStatus> for String {
    fn from(value: DeploymentStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
