//! Run orchestration.
//!
//! Runs every account through an [`AccountProcessor`], records a terminal
//! outcome for each one whatever happens to the others, then merges the
//! artifacts that were produced and publishes the result to every sink.

use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use harvest_core::{
    AccountCredential, AccountOutcome, AccountProcessor, AccountStatus, CancelToken, DatasetSink,
    FailureStage, MergeOptions, ReportArtifact, ReportQuery,
};
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};

use crate::merger::merge_artifacts;

// ============================================================================
// Reports
// ============================================================================

/// What happened after the accounts finished.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishReport {
    /// Data rows in the merged dataset.
    pub merged_rows: usize,
    /// Labels whose artifacts were merged.
    pub included: Vec<String>,
    /// Labels whose artifacts could not be parsed, with the reason.
    pub excluded: Vec<(String, String)>,
    /// Why the merge produced nothing, if it did.
    pub merge_error: Option<String>,
    /// Sinks that failed, with the reason.
    pub sink_errors: Vec<(String, String)>,
}

impl PublishReport {
    /// Returns true if the merge produced data and every sink accepted it.
    pub fn is_success(&self) -> bool {
        self.merge_error.is_none() && self.sink_errors.is_empty()
    }
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Partition the merged dataset was published to.
    pub partition_key: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall time in milliseconds.
    pub duration_ms: u64,
    /// One outcome per account, in input order.
    pub outcomes: Vec<AccountOutcome>,
    /// Merge and publish results.
    pub publish: PublishReport,
}

impl RunReport {
    /// Accounts that produced an artifact.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Accounts that did not.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Failed accounts as `(label, stage, message)`.
    pub fn failures(&self) -> impl Iterator<Item = (&str, FailureStage, &str)> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            AccountStatus::Failed { stage, message } => {
                Some((o.label.as_str(), *stage, message.as_str()))
            }
            AccountStatus::Succeeded { .. } => None,
        })
    }

    /// Returns true if every account succeeded and the merge was published.
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.publish.is_success()
    }

    /// Process exit status for this run.
    pub fn exit_code(&self) -> u8 {
        u8::from(!self.is_success())
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Drives a run over a list of accounts.
pub struct Orchestrator<P: AccountProcessor> {
    processor: P,
    concurrency: usize,
    merge_options: MergeOptions,
    sinks: Vec<Box<dyn DatasetSink>>,
}

impl<P: AccountProcessor> Orchestrator<P> {
    /// Creates an orchestrator running up to `concurrency` accounts at once.
    /// Zero is treated as one.
    pub fn new(processor: P, concurrency: usize) -> Self {
        Self {
            processor,
            concurrency: concurrency.max(1),
            merge_options: MergeOptions::default(),
            sinks: Vec::new(),
        }
    }

    /// Adds a sink. Sinks are published to in the order they were added.
    #[must_use]
    pub fn with_sink(mut self, sink: impl DatasetSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Adds already boxed sinks, after any added before.
    #[must_use]
    pub fn with_sinks(mut self, sinks: Vec<Box<dyn DatasetSink>>) -> Self {
        self.sinks.extend(sinks);
        self
    }

    /// Overrides the merge options.
    #[must_use]
    pub fn with_merge_options(mut self, options: MergeOptions) -> Self {
        self.merge_options = options;
        self
    }

    /// Names of the configured sinks.
    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Processes every account, then merges and publishes.
    ///
    /// Never fails as a whole: each account ends in an outcome, and merge
    /// or sink problems are recorded in the report.
    pub async fn run(
        &self,
        accounts: &[AccountCredential],
        query: &ReportQuery,
        cancel: &CancelToken,
    ) -> RunReport {
        let started_at = Utc::now();
        let started = Instant::now();
        let partition_key = query.partition_key();
        info!(
            accounts = accounts.len(),
            concurrency = self.concurrency,
            start = %query.start_param(),
            end = %query.end_param(),
            "Run started"
        );

        // Buffered keeps results in input order, so the merge follows the
        // account list regardless of completion order.
        let results: Vec<(AccountOutcome, Option<ReportArtifact>)> = stream::iter(accounts)
            .map(|account| self.process_account(account, query, cancel))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut outcomes = Vec::with_capacity(results.len());
        let mut artifacts = Vec::new();
        for (outcome, artifact) in results {
            outcomes.push(outcome);
            artifacts.extend(artifact);
        }

        let publish =
            publish_merged(&artifacts, &partition_key, &self.merge_options, &self.sinks).await;

        let report = RunReport {
            partition_key,
            started_at,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            outcomes,
            publish,
        };
        if report.is_success() {
            info!(
                succeeded = report.succeeded(),
                rows = report.publish.merged_rows,
                duration_ms = report.duration_ms,
                "Run finished"
            );
        } else {
            warn!(
                succeeded = report.succeeded(),
                failed = report.failed(),
                merge_error = ?report.publish.merge_error,
                sink_errors = report.publish.sink_errors.len(),
                duration_ms = report.duration_ms,
                "Run finished with errors"
            );
        }
        report
    }

    async fn process_account(
        &self,
        account: &AccountCredential,
        query: &ReportQuery,
        cancel: &CancelToken,
    ) -> (AccountOutcome, Option<ReportArtifact>) {
        let span = info_span!("account", label = %account.label);
        let result = self
            .processor
            .process(account, query, cancel)
            .instrument(span)
            .await;

        match result {
            Ok(artifact) => {
                let outcome = AccountOutcome {
                    label: account.label.clone(),
                    status: AccountStatus::Succeeded {
                        strategy_id: artifact.strategy_id.clone(),
                        bytes: artifact.len(),
                        path: artifact.path.clone(),
                    },
                };
                (outcome, Some(artifact))
            }
            Err(failure) => {
                error!(
                    label = %account.label,
                    stage = %failure.stage,
                    error = %failure.message,
                    "Account failed"
                );
                let outcome = AccountOutcome {
                    label: account.label.clone(),
                    status: AccountStatus::Failed {
                        stage: failure.stage,
                        message: failure.message,
                    },
                };
                (outcome, None)
            }
        }
    }
}

/// Merges `artifacts` in order and publishes the result to every sink.
///
/// A sink failure is recorded and does not stop the remaining sinks.
pub async fn publish_merged(
    artifacts: &[ReportArtifact],
    partition_key: &str,
    options: &MergeOptions,
    sinks: &[Box<dyn DatasetSink>],
) -> PublishReport {
    let summary = match merge_artifacts(artifacts, options) {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "Merge produced no data");
            return PublishReport {
                merge_error: Some(e.to_string()),
                ..PublishReport::default()
            };
        }
    };

    let mut sink_errors = Vec::new();
    for sink in sinks {
        if let Err(e) = sink.publish(partition_key, &summary.dataset).await {
            error!(sink = sink.name(), error = %e, "Sink failed");
            sink_errors.push((sink.name().to_string(), e.to_string()));
        }
    }

    PublishReport {
        merged_rows: summary.data_rows(),
        included: summary.included,
        excluded: summary.excluded,
        merge_error: None,
        sink_errors,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use harvest_core::{AccountFailure, CoreError, Dataset, Secret};
    use std::sync::{Arc, Mutex};

    struct TableProcessor;

    #[async_trait]
    impl AccountProcessor for TableProcessor {
        async fn process(
            &self,
            account: &AccountCredential,
            _query: &ReportQuery,
            _cancel: &CancelToken,
        ) -> Result<ReportArtifact, AccountFailure> {
            let body = format!("name\n{}\n", account.identity);
            ReportArtifact::new(account.label.clone(), body.into_bytes(), "test")
                .map_err(|e| AccountFailure::new(FailureStage::Acquire, e.to_string()))
        }
    }

    #[derive(Clone, Default)]
    struct Recording {
        published: Arc<Mutex<Vec<(String, Dataset)>>>,
    }

    #[async_trait]
    impl DatasetSink for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn publish(&self, partition_key: &str, dataset: &Dataset) -> Result<(), CoreError> {
            self.published
                .lock()
                .unwrap()
                .push((partition_key.to_string(), dataset.clone()));
            Ok(())
        }
    }

    fn query() -> ReportQuery {
        ReportQuery::single_day(chrono::NaiveDate::from_ymd_opt(2025, 6, 30).unwrap())
    }

    #[tokio::test]
    async fn test_run_merges_in_account_order() {
        let sink = Recording::default();
        let accounts = vec![
            AccountCredential::new("A", "a1", Secret::new("x")),
            AccountCredential::new("B", "b1", Secret::new("x")),
        ];

        let report = Orchestrator::new(TableProcessor, 2)
            .with_sink(sink.clone())
            .run(&accounts, &query(), &CancelToken::never())
            .await;

        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.partition_key, "2025-06-30");
        let published = sink.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(
            published[0].1,
            Dataset::from_str_rows(&[&["name", "source"], &["a1", "A"], &["b1", "B"]])
        );
    }

    #[tokio::test]
    async fn test_no_accounts_is_a_failed_run() {
        let report = Orchestrator::new(TableProcessor, 1)
            .run(&[], &query(), &CancelToken::never())
            .await;

        assert!(report.publish.merge_error.is_some());
        assert_eq!(report.exit_code(), 1);
    }
}
