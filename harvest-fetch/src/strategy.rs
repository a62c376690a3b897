//! Acquisition strategy trait and types.
//!
//! A strategy is one self-contained way of obtaining the report bytes from
//! the portal once the report view is showing results. The pipeline tries
//! strategies in order until one succeeds.

use async_trait::async_trait;
use harvest_core::ReportArtifact;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::AcquireContext;

// ============================================================================
// Acquisition Kind
// ============================================================================

/// The mechanism a strategy uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionKind {
    /// Click the download control and watch the download directory.
    DownloadWatch,
    /// Hook client-side blob creation, click, and read the captured bytes.
    ResourceCapture,
    /// Replay the download request with the session's cookies.
    AuthenticatedReplay,
    /// Guess export endpoints next to the report view.
    DirectRequest,
}

impl AcquisitionKind {
    /// Returns the display name for this kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::DownloadWatch => "Download Watch",
            Self::ResourceCapture => "Resource Capture",
            Self::AuthenticatedReplay => "Authenticated Replay",
            Self::DirectRequest => "Direct Request",
        }
    }
}

impl fmt::Display for AcquisitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Strategy Outcome
// ============================================================================

/// What a single strategy invocation produced.
#[derive(Debug)]
pub enum StrategyOutcome {
    /// The artifact was obtained.
    Success(ReportArtifact),
    /// The strategy ran and did not obtain the artifact.
    Failure(String),
    /// The strategy's precondition did not hold, so it did nothing.
    Skipped(String),
}

impl StrategyOutcome {
    /// Shorthand for a failure.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure(reason.into())
    }

    /// Shorthand for a skip.
    pub fn skipped(precondition: impl Into<String>) -> Self {
        Self::Skipped(precondition.into())
    }

    /// Returns true on success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

// ============================================================================
// Acquisition Strategy Trait
// ============================================================================

/// One method of obtaining a report artifact.
///
/// Strategies report their result as a value rather than an error so that
/// moving to the next strategy is ordinary dispatch. A strategy is invoked
/// at most once per account per run and must not retry internally; any
/// waiting it does goes through a bounded poll.
///
/// ## Implementing a Strategy
///
/// ```ignore
/// struct FromFixture(Vec<u8>);
///
/// #[async_trait]
/// impl AcquisitionStrategy for FromFixture {
///     fn id(&self) -> &str {
///         "fixture"
///     }
///
///     fn kind(&self) -> AcquisitionKind {
///         AcquisitionKind::DirectRequest
///     }
///
///     async fn attempt(&self, ctx: &AcquireContext<'_>) -> StrategyOutcome {
///         match ctx.store_bytes(self.0.clone(), self.id()).await {
///             Ok(artifact) => StrategyOutcome::Success(artifact),
///             Err(e) => StrategyOutcome::failure(e.to_string()),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    /// Stable identifier, used in configuration and provenance.
    fn id(&self) -> &str;

    /// The mechanism this strategy uses.
    fn kind(&self) -> AcquisitionKind;

    /// Human-readable name for this strategy.
    fn display_name(&self) -> String {
        format!("{} ({})", self.id(), self.kind().display_name())
    }

    /// Tries once to obtain the artifact.
    async fn attempt(&self, ctx: &AcquireContext<'_>) -> StrategyOutcome;
}

// ============================================================================
// Tests
// ============================================================================
