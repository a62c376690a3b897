//! Merging report artifacts.
//!
//! Parses each artifact, drops the ones that are not tabular, and hands the
//! rest to the core merge in account order. Also rebuilds the artifact list
//! from an output directory so a merge can be repeated without browsing.

use std::path::{Path, PathBuf};

use harvest_core::{
    merge_datasets_with, sanitize_label, CoreError, Dataset, MergeOptions, ReportArtifact,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::StoreError;
use crate::tabular::parse_artifact;

/// Strategy id recorded for artifacts loaded back from disk.
pub const LOADED_FROM_DISK: &str = "disk";

// ============================================================================
// Merge
// ============================================================================

/// Result of merging a set of artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct MergeSummary {
    /// The merged dataset, header first.
    #[serde(skip)]
    pub dataset: Dataset,
    /// Labels that contributed, in merge order.
    pub included: Vec<String>,
    /// Labels that were excluded, with the reason.
    pub excluded: Vec<(String, String)>,
}

impl MergeSummary {
    /// Data rows in the merged dataset, header excluded.
    pub fn data_rows(&self) -> usize {
        self.dataset.data_rows().len()
    }
}

/// Parses and merges `artifacts` in the given order.
///
/// An artifact that does not parse is logged and left out. Fails with
/// [`CoreError::NoValidData`] when nothing parsed.
#[instrument(skip_all, fields(artifacts = artifacts.len()))]
pub fn merge_artifacts(
    artifacts: &[ReportArtifact],
    options: &MergeOptions,
) -> Result<MergeSummary, CoreError> {
    let mut sources = Vec::with_capacity(artifacts.len());
    let mut excluded = Vec::new();

    for artifact in artifacts {
        match parse_artifact(&artifact.account_label, artifact.content()) {
            Ok(dataset) => {
                debug!(
                    label = %artifact.account_label,
                    rows = dataset.row_count(),
                    "Artifact parsed for merge"
                );
                sources.push((artifact.account_label.clone(), dataset));
            }
            Err(e) => {
                warn!(label = %artifact.account_label, error = %e, "Artifact excluded from merge");
                excluded.push((artifact.account_label.clone(), e.to_string()));
            }
        }
    }

    let included: Vec<String> = sources.iter().map(|(label, _)| label.clone()).collect();
    let dataset = merge_datasets_with(sources, options).map_err(|e| match e {
        CoreError::NoValidData { .. } => CoreError::NoValidData {
            sources: artifacts.len(),
        },
        other => other,
    })?;

    info!(
        included = included.len(),
        excluded = excluded.len(),
        rows = dataset.data_rows().len(),
        "Artifacts merged"
    );
    Ok(MergeSummary {
        dataset,
        included,
        excluded,
    })
}

// ============================================================================
// Artifacts on Disk
// ============================================================================

/// Finds per-account artifacts named `{prefix}{label}.{extension}` in `dir`.
///
/// Returns `(label, path)` pairs. Labels that match a configured account
/// (compared after sanitizing) come first, in `account_order`, and take the
/// configured spelling; the rest follow alphabetically. Files starting with
/// `merged_prefix` are merged outputs and are never treated as accounts.
pub fn discover_artifacts(
    dir: &Path,
    prefix: &str,
    merged_prefix: &str,
    extension: &str,
    account_order: &[String],
) -> Result<Vec<(String, PathBuf)>, StoreError> {
    let suffix = format!(".{}", extension.trim_start_matches('.'));
    let mut found: Vec<(String, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !merged_prefix.is_empty() && name.starts_with(merged_prefix) {
            continue;
        }
        let Some(label) = name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(&suffix))
        else {
            continue;
        };
        if label.is_empty() {
            continue;
        }
        found.push((label.to_string(), entry.path()));
    }

    let mut ordered = Vec::with_capacity(found.len());
    for account in account_order {
        let key = sanitize_label(account);
        if let Some(index) = found.iter().position(|(label, _)| *label == key) {
            let (_, path) = found.remove(index);
            ordered.push((account.clone(), path));
        }
    }
    found.sort_by(|a, b| a.0.cmp(&b.0));
    ordered.extend(found);

    debug!(dir = %dir.display(), count = ordered.len(), "Artifacts discovered");
    Ok(ordered)
}

/// Reads discovered artifacts back into memory. Empty files are skipped.
pub async fn load_artifacts(
    found: &[(String, PathBuf)],
) -> Result<Vec<ReportArtifact>, StoreError> {
    let mut artifacts = Vec::with_capacity(found.len());
    for (label, path) in found {
        let bytes = tokio::fs::read(path).await?;
        if bytes.is_empty() {
            warn!(label = %label, path = %path.display(), "Empty artifact file skipped");
            continue;
        }
        let artifact = ReportArtifact::new(label.clone(), bytes, LOADED_FROM_DISK)?.with_path(path);
        artifacts.push(artifact);
    }
    Ok(artifacts)
}

// ============================================================================
// Tests
// ============================================================================
