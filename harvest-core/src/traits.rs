//! Trait definitions for `ReportHarvest`.
//!
//! These are the seams between the run orchestration and the outside world:
//! - [`AccountProcessor`] turns one account into a report artifact
//! - [`DatasetSink`] persists the merged dataset

use async_trait::async_trait;
use std::fmt;

use crate::cancel::CancelToken;
use crate::error::CoreError;
use crate::models::{AccountCredential, Dataset, FailureStage, ReportArtifact, ReportQuery};

/// Why one account did not produce an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountFailure {
    /// Failing step.
    pub stage: FailureStage,
    /// Error description.
    pub message: String,
}

impl AccountFailure {
    /// Creates a failure at `stage`.
    pub fn new(stage: FailureStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }

    /// A cancellation failure.
    pub fn cancelled() -> Self {
        Self::new(FailureStage::Cancelled, "run cancelled")
    }
}

impl fmt::Display for AccountFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.message)
    }
}

impl std::error::Error for AccountFailure {}

/// Produces the report artifact for one account.
///
/// Implementors own whatever session resource they open and must release it
/// on every exit path, including when `cancel` fires.
#[async_trait]
pub trait AccountProcessor: Send + Sync {
    /// Processes one account end to end.
    async fn process(
        &self,
        account: &AccountCredential,
        query: &ReportQuery,
        cancel: &CancelToken,
    ) -> Result<ReportArtifact, AccountFailure>;
}

/// Persists a merged dataset into a dated partition.
///
/// The sink creates the partition or reuses an existing one, clears any prior
/// content, and writes the grid from the top-left origin.
#[async_trait]
pub trait DatasetSink: Send + Sync {
    /// Short name for logs and summaries.
    fn name(&self) -> &str;

    /// Writes `dataset` into the partition identified by `partition_key`
    /// (the reporting date as `YYYY-MM-DD`).
    async fn publish(&self, partition_key: &str, dataset: &Dataset) -> Result<(), CoreError>;
}
