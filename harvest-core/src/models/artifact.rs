//! Raw report artifacts.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::error::CoreError;

/// Raw report bytes obtained for one account, plus provenance.
///
/// The content is never empty: [`ReportArtifact::new`] rejects empty bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    /// Label of the account this report belongs to.
    pub account_label: String,
    content: Vec<u8>,
    /// Id of the acquisition strategy that produced the bytes.
    pub strategy_id: String,
    /// When the bytes were obtained.
    pub acquired_at: DateTime<Utc>,
    /// Where the bytes were written, if they were persisted.
    pub path: Option<PathBuf>,
}

impl ReportArtifact {
    /// Creates an artifact. Fails if `content` is empty.
    pub fn new(
        account_label: impl Into<String>,
        content: Vec<u8>,
        strategy_id: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let account_label = account_label.into();
        if content.is_empty() {
            return Err(CoreError::InvalidData(format!(
                "empty report artifact for {account_label}"
            )));
        }
        Ok(Self {
            account_label,
            content,
            strategy_id: strategy_id.into(),
            acquired_at: Utc::now(),
            path: None,
        })
    }

    /// Records where the artifact was written.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// The raw bytes.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Size in bytes. Always greater than zero.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Consumes the artifact, returning its bytes.
    pub fn into_content(self) -> Vec<u8> {
        self.content
    }
}

/// Replaces characters that are unsafe in file names with `_`.
pub fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "account".to_string()
    } else {
        cleaned
    }
}

/// The canonical artifact file name for an account: `{prefix}{label}.{extension}`.
pub fn artifact_file_name(prefix: &str, label: &str, extension: &str) -> String {
    format!(
        "{prefix}{}.{}",
        sanitize_label(label),
        extension.trim_start_matches('.')
    )
}
