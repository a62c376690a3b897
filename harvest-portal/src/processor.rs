//! Per-account processing: session, login, navigation, acquisition.
//!
//! [`PortalProcessor`] is the [`AccountProcessor`] the orchestrator drives.
//! Each call opens its own browser session, so accounts share no mutable
//! state. The session is closed on every exit path, including
//! cancellation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use harvest_core::{
    artifact_file_name, AccountCredential, AccountFailure, AccountProcessor, CancelToken,
    FailureStage, PortalDescriptor, ReportArtifact, ReportQuery, WaitSettings,
};
use harvest_fetch::{
    AcquireContext, AcquireSettings, AcquisitionPipeline, Clock, HttpClient, PageDriver,
    SessionFactory, SystemClock,
};
use tracing::{debug, info, instrument, warn};

use crate::auth::Authenticator;
use crate::descriptor::{build_pipeline, DEFAULT_STRATEGY_ORDER};
use crate::diagnostics::{stage, Diagnostics};
use crate::error::PortalError;
use crate::navigator::Navigator;
use crate::web::host_of;

/// Default artifact file name prefix.
pub const DEFAULT_ARTIFACT_PREFIX: &str = "reporte_pacientes_";

// ============================================================================
// Options
// ============================================================================

/// Run-wide settings for [`PortalProcessor`].
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    /// Where artifacts are written.
    pub output_dir: PathBuf,
    /// Artifact file name prefix.
    pub artifact_prefix: String,
    /// Acquisition budgets and thresholds.
    pub acquire: AcquireSettings,
    /// Wait budgets for login and navigation.
    pub waits: WaitSettings,
    /// Acquisition strategy ids, in run order.
    pub strategies: Vec<String>,
    /// Screenshot capture.
    pub diagnostics: Diagnostics,
}

impl ProcessorOptions {
    /// Default options writing into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            artifact_prefix: DEFAULT_ARTIFACT_PREFIX.to_string(),
            acquire: AcquireSettings::default(),
            waits: WaitSettings::default(),
            strategies: DEFAULT_STRATEGY_ORDER.iter().map(|s| (*s).to_string()).collect(),
            diagnostics: Diagnostics::disabled(),
        }
    }
}

// ============================================================================
// Processor
// ============================================================================

/// Processes one account against the portal.
pub struct PortalProcessor<F> {
    factory: F,
    portal: PortalDescriptor,
    pipeline: AcquisitionPipeline,
    http: HttpClient,
    clock: Arc<dyn Clock>,
    options: ProcessorOptions,
}

impl<F: SessionFactory> PortalProcessor<F> {
    /// Creates a processor.
    ///
    /// Validates the portal descriptor and the strategy order, and limits
    /// the HTTP client to the report host.
    pub fn new(
        factory: F,
        portal: PortalDescriptor,
        options: ProcessorOptions,
    ) -> Result<Self, PortalError> {
        portal.validate()?;
        let pipeline = build_pipeline(&portal, &options.strategies)?;

        let mut http = HttpClient::with_timeout(options.waits.http())?;
        match host_of(&portal.report_url) {
            Some(host) => http = http.allow_domains(vec![host]),
            None => {
                return Err(PortalError::InvalidUrl {
                    url: portal.report_url.clone(),
                    reason: "no host".to_string(),
                });
            }
        }

        Ok(Self {
            factory,
            portal,
            pipeline,
            http,
            clock: Arc::new(SystemClock),
            options,
        })
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the HTTP client used by replay strategies.
    pub fn with_http_client(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    /// Where the artifact for `label` is written.
    pub fn canonical_path(&self, label: &str) -> PathBuf {
        self.options.output_dir.join(artifact_file_name(
            &self.options.artifact_prefix,
            label,
            &self.options.acquire.artifact_extension,
        ))
    }

    /// The acquisition pipeline in run order.
    pub fn pipeline(&self) -> &AcquisitionPipeline {
        &self.pipeline
    }

    async fn run(
        &self,
        page: &dyn PageDriver,
        account: &AccountCredential,
        query: &ReportQuery,
    ) -> Result<ReportArtifact, AccountFailure> {
        let clock = self.clock.as_ref();
        let waits = &self.options.waits;
        let diagnostics = &self.options.diagnostics;

        Authenticator::new(&self.portal, waits, clock, diagnostics)
            .login(page, account)
            .await
            .map_err(|e| failure(FailureStage::Login, e))?;

        let view = Navigator::new(&self.portal, waits, clock, diagnostics)
            .fetch_report_view(page, query, &account.label)
            .await
            .map_err(|e| failure(FailureStage::Navigate, e))?;
        debug!(url = %view.url, "Acquiring from report view");

        tokio::fs::create_dir_all(&self.options.output_dir)
            .await
            .map_err(|e| {
                failure(
                    FailureStage::Acquire,
                    format!("cannot create {}: {e}", self.options.output_dir.display()),
                )
            })?;

        let canonical = self.canonical_path(&account.label);
        let download_dir = page
            .download_dir()
            .map_or_else(|| self.options.output_dir.clone(), Path::to_path_buf);

        let ctx = AcquireContext {
            page,
            query,
            account_label: &account.label,
            canonical_path: &canonical,
            download_dir: &download_dir,
            http: &self.http,
            clock,
            settings: &self.options.acquire,
        };

        let outcome = self.pipeline.execute(&ctx).await;
        for attempt in &outcome.attempts {
            debug!(
                ordinal = attempt.ordinal,
                strategy = %attempt.strategy_id,
                outcome = ?attempt.outcome,
                duration_ms = attempt.duration.as_millis(),
                "Acquisition attempt"
            );
        }
        outcome.result.map_err(|e| failure(FailureStage::Acquire, e))
    }
}

#[async_trait]
impl<F: SessionFactory> AccountProcessor for PortalProcessor<F> {
    #[instrument(skip(self, account, query, cancel), fields(account = %account.label))]
    async fn process(
        &self,
        account: &AccountCredential,
        query: &ReportQuery,
        cancel: &CancelToken,
    ) -> Result<ReportArtifact, AccountFailure> {
        if cancel.is_cancelled() {
            return Err(AccountFailure::cancelled());
        }

        let page = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AccountFailure::cancelled()),
            opened = self.factory.open(&account.label) => {
                opened.map_err(|e| failure(FailureStage::Session, e))?
            }
        };

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(AccountFailure::cancelled()),
            result = self.run(page.as_ref(), account, query) => result,
        };

        if let Err(ref err) = result {
            let capture_stage = match err.stage {
                FailureStage::Acquire => Some(stage::ACQUIRE_FAILED),
                FailureStage::Cancelled => None,
                _ => Some(stage::ERROR),
            };
            if let Some(capture_stage) = capture_stage {
                self.options
                    .diagnostics
                    .capture(page.as_ref(), capture_stage, &account.label)
                    .await;
            }
        }

        if let Err(e) = page.close().await {
            warn!(error = %e, "Browser session did not close cleanly");
        }

        match &result {
            Ok(artifact) => info!(
                strategy = %artifact.strategy_id,
                bytes = artifact.len(),
                "Account completed"
            ),
            Err(err) => warn!(stage = %err.stage, error = %err.message, "Account failed"),
        }
        result
    }
}

fn failure(stage: FailureStage, err: impl std::fmt::Display) -> AccountFailure {
    AccountFailure::new(stage, err.to_string())
}
