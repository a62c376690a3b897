//! Acquisition context providing access to host APIs.
//!
//! The context is built once per account after the report view is ready and
//! is passed by reference to every strategy. It bundles everything a
//! strategy may touch: the page, the HTTP client, the clock, and where the
//! artifact must end up.

use std::path::Path;
use std::time::Duration;

use harvest_core::{ReportArtifact, ReportQuery, WaitSettings};
use tracing::info;

use crate::clock::Clock;
use crate::error::FetchError;
use crate::host::{browser::PageDriver, files, http::HttpClient};
use crate::wait::WaitSpec;

/// Default minimum size of a replayed payload.
pub const DEFAULT_MIN_PAYLOAD_BYTES: usize = 1024;

// ============================================================================
// Acquire Settings
// ============================================================================

/// Budgets and thresholds for acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireSettings {
    /// How long to watch for a materialized download.
    pub download_timeout: Duration,
    /// How long to wait for a captured in-page resource.
    pub capture_timeout: Duration,
    /// Delay between polls.
    pub poll_interval: Duration,
    /// Smallest replayed payload accepted as a report.
    pub min_payload_bytes: usize,
    /// Extension of downloaded report files, without the dot.
    pub artifact_extension: String,
}

impl Default for AcquireSettings {
    fn default() -> Self {
        Self::from_waits(&WaitSettings::default(), DEFAULT_MIN_PAYLOAD_BYTES, "xlsx")
    }
}

impl AcquireSettings {
    /// Derives settings from the configured wait budgets.
    pub fn from_waits(waits: &WaitSettings, min_payload_bytes: usize, extension: &str) -> Self {
        Self {
            download_timeout: waits.download(),
            capture_timeout: waits.capture(),
            poll_interval: waits.poll_interval(),
            min_payload_bytes,
            artifact_extension: extension.trim_start_matches('.').to_string(),
        }
    }
}

// ============================================================================
// Acquire Context
// ============================================================================

/// Everything a strategy may use for one account.
pub struct AcquireContext<'a> {
    /// The account's page, showing the report results.
    pub page: &'a dyn PageDriver,
    /// The submitted query.
    pub query: &'a ReportQuery,
    /// Account label, for provenance.
    pub account_label: &'a str,
    /// Where the artifact must end up, overwriting any stale file.
    pub canonical_path: &'a Path,
    /// Where the browser saves downloads.
    pub download_dir: &'a Path,
    /// Client for replayed and constructed requests.
    pub http: &'a HttpClient,
    /// Time source for bounded waits.
    pub clock: &'a dyn Clock,
    /// Budgets and thresholds.
    pub settings: &'a AcquireSettings,
}

impl AcquireContext<'_> {
    /// Wait spec for download materialization.
    pub fn download_wait(&self) -> WaitSpec {
        WaitSpec::new(self.settings.download_timeout, self.settings.poll_interval)
    }

    /// Wait spec for in-page resource capture.
    pub fn capture_wait(&self) -> WaitSpec {
        WaitSpec::new(self.settings.capture_timeout, self.settings.poll_interval)
    }

    /// Writes `bytes` to the canonical path and returns the artifact.
    pub async fn store_bytes(
        &self,
        bytes: Vec<u8>,
        strategy_id: &str,
    ) -> Result<ReportArtifact, FetchError> {
        let artifact = ReportArtifact::new(self.account_label, bytes, strategy_id)?;
        files::write_atomic(self.canonical_path, artifact.content()).await?;
        info!(
            account = %self.account_label,
            strategy = strategy_id,
            bytes = artifact.len(),
            path = %self.canonical_path.display(),
            "Artifact stored"
        );
        Ok(artifact.with_path(self.canonical_path))
    }

    /// Moves a downloaded file to the canonical path and returns the
    /// artifact read back from there.
    pub async fn promote_download(
        &self,
        downloaded: &Path,
        strategy_id: &str,
    ) -> Result<ReportArtifact, FetchError> {
        files::promote(downloaded, self.canonical_path).await?;
        let bytes = tokio::fs::read(self.canonical_path).await?;
        let artifact = ReportArtifact::new(self.account_label, bytes, strategy_id)?;
        info!(
            account = %self.account_label,
            strategy = strategy_id,
            bytes = artifact.len(),
            path = %self.canonical_path.display(),
            "Download promoted to artifact"
        );
        Ok(artifact.with_path(self.canonical_path))
    }
}

impl std::fmt::Debug for AcquireContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquireContext")
            .field("account_label", &self.account_label)
            .field("query", &self.query)
            .field("canonical_path", &self.canonical_path)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
