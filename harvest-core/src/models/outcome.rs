//! Per-account run outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The step at which an account failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Opening the browser session.
    Session,
    /// Authenticating.
    Login,
    /// Reaching the report view and submitting the query.
    Navigate,
    /// Obtaining the report bytes.
    Acquire,
    /// The run was cancelled while the account was in flight.
    Cancelled,
}

impl FailureStage {
    /// Returns the display name for this stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Login => "login",
            Self::Navigate => "navigate",
            Self::Acquire => "acquire",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Terminal state of one account in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AccountStatus {
    /// The report was acquired.
    Succeeded {
        /// Strategy that produced the artifact.
        strategy_id: String,
        /// Artifact size in bytes.
        bytes: usize,
        /// Where the artifact was written.
        path: Option<PathBuf>,
    },
    /// The account failed at `stage`.
    Failed {
        /// Failing step.
        stage: FailureStage,
        /// Error description.
        message: String,
    },
}

/// Outcome of one account, reported regardless of success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOutcome {
    /// Account label.
    pub label: String,
    /// Terminal state.
    #[serde(flatten)]
    pub status: AccountStatus,
}

impl AccountOutcome {
    /// Returns true if the account produced an artifact.
    pub fn is_success(&self) -> bool {
        matches!(self.status, AccountStatus::Succeeded { .. })
    }
}
