//! Run orchestration with scripted account processors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use harvest_core::{
    AccountCredential, AccountFailure, AccountProcessor, AccountStatus, CancelSource, CancelToken,
    CoreError, Dataset, DatasetSink, FailureStage, ReportArtifact, ReportQuery, Secret,
};
use harvest_store::{CsvFileSink, Orchestrator};

// ============================================================================
// Fakes
// ============================================================================

enum Script {
    Report { body: &'static str, delay_ms: u64 },
    Fail(FailureStage),
}

#[derive(Default)]
struct ScriptedProcessor {
    scripts: HashMap<String, Script>,
    started: Arc<Mutex<Vec<String>>>,
    finished: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProcessor {
    fn report(mut self, label: &str, body: &'static str, delay_ms: u64) -> Self {
        self.scripts
            .insert(label.to_string(), Script::Report { body, delay_ms });
        self
    }

    fn fail(mut self, label: &str, stage: FailureStage) -> Self {
        self.scripts.insert(label.to_string(), Script::Fail(stage));
        self
    }
}

#[async_trait]
impl AccountProcessor for ScriptedProcessor {
    async fn process(
        &self,
        account: &AccountCredential,
        _query: &ReportQuery,
        cancel: &CancelToken,
    ) -> Result<ReportArtifact, AccountFailure> {
        if cancel.is_cancelled() {
            return Err(AccountFailure::cancelled());
        }
        self.started.lock().unwrap().push(account.label.clone());
        let result = match self.scripts.get(&account.label) {
            Some(Script::Report { body, delay_ms }) => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                Ok(ReportArtifact::new(account.label.clone(), body.as_bytes().to_vec(), "scripted")
                    .unwrap())
            }
            Some(Script::Fail(stage)) => Err(AccountFailure::new(*stage, "scripted failure")),
            None => Err(AccountFailure::new(FailureStage::Session, "no script")),
        };
        self.finished.lock().unwrap().push(account.label.clone());
        result
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    published: Arc<Mutex<Vec<(String, Dataset)>>>,
}

#[async_trait]
impl DatasetSink for RecordingSink {
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

struct FailingSink;

#[async_trait]
impl DatasetSink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    async fn publish(&self, _partition_key: &str, _dataset: &Dataset) -> Result<(), CoreError> {
        Err(CoreError::sink("failing", "quota exceeded"))
    }
}

fn accounts(labels: &[&str]) -> Vec<AccountCredential> {
    labels
        .iter()
        .map(|l| AccountCredential::new(*l, format!("{l}@example.com"), Secret::new("pw")))
        .collect()
}

fn query() -> ReportQuery {
    ReportQuery::single_day(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_failed_account_does_not_stop_later_ones() {
    let processor = ScriptedProcessor::default()
        .report("A", "h1,h2\n1,2\n", 0)
        .fail("B", FailureStage::Login)
        .report("C", "h1,h2\n5,6\n", 0);
    let started = processor.started.clone();
    let sink = RecordingSink::default();

    let report = Orchestrator::new(processor, 1)
        .with_sink(sink.clone())
        .run(&accounts(&["A", "B", "C"]), &query(), &CancelToken::never())
        .await;

    assert_eq!(*started.lock().unwrap(), vec!["A", "B", "C"]);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.exit_code(), 1);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures, vec![("B", FailureStage::Login, "scripted failure")]);

    // Successful accounts are still merged and published.
    assert_eq!(report.publish.included, vec!["A", "C"]);
    let published = sink.published.lock().unwrap();
    assert_eq!(published[0].0, "2025-06-30");
    assert_eq!(
        published[0].1,
        Dataset::from_str_rows(&[&["h1", "h2", "source"], &["1", "2", "A"], &["5", "6", "C"]])
    );
}

#[tokio::test]
async fn test_unparseable_artifact_is_excluded_but_run_fails_only_on_accounts() {
    let processor = ScriptedProcessor::default()
        .report("A", "<html>sesion expirada</html>", 0)
        .report("B", "h\n1\n", 0);

    let report = Orchestrator::new(processor, 1)
        .run(&accounts(&["A", "B"]), &query(), &CancelToken::never())
        .await;

    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.publish.included, vec!["B"]);
    assert_eq!(report.publish.excluded[0].0, "A");
    assert_eq!(report.publish.merged_rows, 1);
    assert!(report.is_success());
}

#[tokio::test]
async fn test_all_failures_report_no_data() {
    let processor = ScriptedProcessor::default()
        .fail("A", FailureStage::Acquire)
        .fail("B", FailureStage::Navigate);
    let sink = RecordingSink::default();

    let report = Orchestrator::new(processor, 2)
        .with_sink(sink.clone())
        .run(&accounts(&["A", "B"]), &query(), &CancelToken::never())
        .await;

    assert!(report.publish.merge_error.as_deref().unwrap().contains("No valid data"));
    assert!(sink.published.lock().unwrap().is_empty());
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_accounts_keep_input_order() {
    let processor = ScriptedProcessor::default()
        .report("A", "h\nslow\n", 300)
        .report("B", "h\nfast\n", 100)
        .report("C", "h\nmedium\n", 200);
    let finished = processor.finished.clone();
    let sink = RecordingSink::default();
    let begin = tokio::time::Instant::now();

    let report = Orchestrator::new(processor, 3)
        .with_sink(sink.clone())
        .run(&accounts(&["A", "B", "C"]), &query(), &CancelToken::never())
        .await;

    assert!(begin.elapsed() < Duration::from_millis(600));
    assert_eq!(*finished.lock().unwrap(), vec!["B", "C", "A"]);
    let labels: Vec<&str> = report.outcomes.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, vec!["A", "B", "C"]);
    assert_eq!(
        sink.published.lock().unwrap()[0].1,
        Dataset::from_str_rows(&[
            &["h", "source"],
            &["slow", "A"],
            &["fast", "B"],
            &["medium", "C"],
        ])
    );
}

#[tokio::test]
async fn test_cancelled_run_records_every_account() {
    let source = CancelSource::new();
    let token = source.token();
    source.cancel();
    let processor = ScriptedProcessor::default().report("A", "h\n1\n", 0);
    let started = processor.started.clone();

    let report = Orchestrator::new(processor, 1)
        .run(&accounts(&["A", "B"]), &query(), &token)
        .await;

    assert!(started.lock().unwrap().is_empty());
    assert_eq!(report.outcomes.len(), 2);
    assert!(report.outcomes.iter().all(|o| matches!(
        o.status,
        AccountStatus::Failed { stage: FailureStage::Cancelled, .. }
    )));
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_sink_failure_is_recorded_and_others_still_run() {
    let dir = tempfile::tempdir().unwrap();
    let processor = ScriptedProcessor::default().report("A", "h\n1\n", 0);
    let csv = CsvFileSink::new(dir.path(), "combinado_");

    let report = Orchestrator::new(processor, 1)
        .with_sink(FailingSink)
        .with_sink(csv.clone())
        .run(&accounts(&["A"]), &query(), &CancelToken::never())
        .await;

    assert_eq!(report.publish.sink_errors.len(), 1);
    assert_eq!(report.publish.sink_errors[0].0, "failing");
    assert!(report.publish.sink_errors[0].1.contains("quota exceeded"));
    assert_eq!(
        std::fs::read_to_string(csv.path_for("2025-06-30")).unwrap(),
        "h,source\n1,A\n"
    );
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_report_serializes_outcomes() {
    let processor = ScriptedProcessor::default()
        .report("A", "h\n1\n", 0)
        .fail("B", FailureStage::Login);

    let report = Orchestrator::new(processor, 1)
        .run(&accounts(&["A", "B"]), &query(), &CancelToken::never())
        .await;

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["partition_key"], "2025-06-30");
    assert_eq!(json["outcomes"][0]["status"], "succeeded");
    assert_eq!(json["outcomes"][0]["strategy_id"], "scripted");
    assert_eq!(json["outcomes"][1]["status"], "failed");
    assert_eq!(json["outcomes"][1]["stage"], "login");
}
