//! Plain-text run summaries.

use std::fmt::Write;

use harvest_core::AccountStatus;
use harvest_store::{PublishReport, RunReport};

/// Formats the end-of-run summary: one line per account, then the merge.
pub fn format_run_summary(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Report date {}", report.partition_key);
    let _ = writeln!(
        out,
        "Accounts: {} processed, {} artifacts, {} failed",
        report.outcomes.len(),
        report.succeeded(),
        report.failed()
    );

    for outcome in &report.outcomes {
        match &outcome.status {
            AccountStatus::Succeeded {
                strategy_id,
                bytes,
                path,
            } => {
                let _ = write!(out, "  ok    {:<20} {strategy_id} ({bytes} bytes)", outcome.label);
                if let Some(path) = path {
                    let _ = write!(out, " -> {}", path.display());
                }
                out.push('\n');
            }
            AccountStatus::Failed { stage, message } => {
                let _ = writeln!(out, "  FAIL  {:<20} [{stage}] {message}", outcome.label);
            }
        }
    }

    out.push_str(&format_publish_summary(&report.partition_key, &report.publish));
    out
}

/// Formats what the merge and the sinks did.
pub fn format_publish_summary(partition_key: &str, publish: &PublishReport) -> String {
    let mut out = String::new();
    match &publish.merge_error {
        Some(error) => {
            let _ = writeln!(out, "Merge: no data ({error})");
        }
        None => {
            let _ = writeln!(
                out,
                "Merge: {} rows from {} account(s) into partition {partition_key}",
                publish.merged_rows,
                publish.included.len()
            );
        }
    }
    for (label, reason) in &publish.excluded {
        let _ = writeln!(out, "  excluded {label}: {reason}");
    }
    for (sink, reason) in &publish.sink_errors {
        let _ = writeln!(out, "  sink {sink} failed: {reason}");
    }
    out
}
