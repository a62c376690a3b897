//! Diagnostic screenshots for failure triage.
//!
//! Captures are best effort. A failed capture is logged and never turns
//! into an account failure.

use std::path::{Path, PathBuf};

use harvest_core::sanitize_label;
use harvest_fetch::PageDriver;
use tracing::{debug, warn};

/// Named points at which a screenshot is taken.
pub mod stage {
    /// Right after the login form was submitted.
    pub const POST_LOGIN: &str = "post_login";
    /// The report view redirected to the login surface.
    pub const SESSION_EXPIRED: &str = "session_expired";
    /// Dates filled, query not yet submitted.
    pub const BEFORE_QUERY: &str = "before_query";
    /// Results settled.
    pub const AFTER_RESULTS: &str = "after_results";
    /// Every acquisition strategy failed.
    pub const ACQUIRE_FAILED: &str = "acquire_failed";
    /// Any other per-account failure.
    pub const ERROR: &str = "error";
}

/// Writes `{stage}_{label}.png` screenshots into a directory.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    dir: Option<PathBuf>,
}

impl Diagnostics {
    /// Captures into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Captures nothing.
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// Where a capture for `stage` and `label` is written.
    pub fn path_for(&self, stage: &str, label: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{stage}_{}.png", sanitize_label(label))))
    }

    /// Takes a screenshot, swallowing any error.
    pub async fn capture(&self, page: &dyn PageDriver, stage: &str, label: &str) -> Option<PathBuf> {
        let path = self.path_for(stage, label)?;
        if let Err(err) = ensure_parent(&path).await {
            warn!(error = %err, path = %path.display(), "Cannot create diagnostics directory");
            return None;
        }
        match page.screenshot(&path).await {
            Ok(()) => {
                debug!(stage, account = %label, path = %path.display(), "Diagnostic screenshot saved");
                Some(path)
            }
            Err(err) => {
                warn!(stage, account = %label, error = %err, "Diagnostic screenshot failed");
                None
            }
        }
    }
}

async fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) => tokio::fs::create_dir_all(parent).await,
        None => Ok(()),
    }
}
