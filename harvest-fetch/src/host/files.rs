//! Download-directory scanning and artifact writes.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

/// Suffixes browsers use for downloads still in progress.
const PARTIAL_SUFFIXES: &[&str] = &["crdownload", "part", "tmp", "download"];

/// Modification times of the files in a directory at one point in time.
#[derive(Debug, Clone, Default)]
pub struct DirSnapshot {
    files: HashMap<PathBuf, Option<SystemTime>>,
}

impl DirSnapshot {
    /// Number of files seen.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if the directory was empty or missing.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn is_unchanged(&self, path: &Path, modified: Option<SystemTime>) -> bool {
        self.files.get(path).is_some_and(|before| *before == modified)
    }
}

/// Records the files currently in `dir`. A missing directory is empty.
pub async fn snapshot_dir(dir: &Path) -> io::Result<DirSnapshot> {
    let mut files = HashMap::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(DirSnapshot::default()),
        Err(err) => return Err(err),
    };
    while let Some(entry) = entries.next_entry().await? {
        let meta = entry.metadata().await?;
        if meta.is_file() {
            files.insert(entry.path(), meta.modified().ok());
        }
    }
    Ok(DirSnapshot { files })
}

/// Finds a completed download in `dir` that was not in `before`.
///
/// A candidate has the expected extension (case-insensitive), is not a
/// partial download, is non-empty, and is either new or modified since the
/// snapshot. The most recently modified candidate wins.
pub async fn find_new_download(
    dir: &Path,
    before: &DirSnapshot,
    extension: &str,
) -> io::Result<Option<PathBuf>> {
    let extension = extension.trim_start_matches('.');
    let current = snapshot_dir(dir).await?;

    let mut best: Option<(PathBuf, Option<SystemTime>)> = None;
    for (path, modified) in current.files {
        if !has_extension(&path, extension) || is_partial(&path) {
            continue;
        }
        if before.is_unchanged(&path, modified) {
            continue;
        }
        let len = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
        if len == 0 {
            continue;
        }
        if best.as_ref().is_none_or(|(_, t)| modified > *t) {
            best = Some((path, modified));
        }
    }
    Ok(best.map(|(path, _)| path))
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

fn is_partial(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| PARTIAL_SUFFIXES.iter().any(|p| e.eq_ignore_ascii_case(p)))
}

/// Moves `from` to `to`, replacing any stale file at `to`.
///
/// Falls back to copy-then-delete when a rename is not possible, e.g. across
/// file systems.
pub async fn promote(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if tokio::fs::rename(from, to).await.is_ok() {
        debug!(from = %from.display(), to = %to.display(), "Download promoted");
        return Ok(());
    }

    match tokio::fs::remove_file(to).await {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    if tokio::fs::rename(from, to).await.is_err() {
        tokio::fs::copy(from, to).await?;
        tokio::fs::remove_file(from).await?;
    }
    debug!(from = %from.display(), to = %to.display(), "Download promoted after replacing stale file");
    Ok(())
}

/// Writes `bytes` to `to` through a sibling temporary file, so readers never
/// see a half-written artifact.
pub async fn write_atomic(to: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut staging = to.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    tokio::fs::write(&staging, bytes).await?;
    promote(&staging, to).await
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_dir_snapshot_is_empty() {
        let tmp = TempDir::new().unwrap();
        let snap = snapshot_dir(&tmp.path().join("nope")).await.unwrap();
        assert!(snap.is_empty());
    }

    #[tokio::test]
    async fn test_new_file_is_found() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("old.xlsx"), b"old").unwrap();
        let before = snapshot_dir(tmp.path()).await.unwrap();

        assert_eq!(find_new_download(tmp.path(), &before, "xlsx").await.unwrap(), None);

        std::fs::write(tmp.path().join("Reporte.XLSX"), b"PK\x03\x04").unwrap();
        let found = find_new_download(tmp.path(), &before, ".xlsx").await.unwrap();
        assert_eq!(found, Some(tmp.path().join("Reporte.XLSX")));
    }

    #[tokio::test]
    async fn test_partial_and_empty_files_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let before = snapshot_dir(tmp.path()).await.unwrap();

        std::fs::write(tmp.path().join("r.xlsx.crdownload"), b"partial").unwrap();
        std::fs::write(tmp.path().join("empty.xlsx"), b"").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"hello").unwrap();

        assert_eq!(find_new_download(tmp.path(), &before, "xlsx").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_promote_overwrites_stale_file() {
        let tmp = TempDir::new().unwrap();
        let from = tmp.path().join("incoming/report.xlsx");
        let to = tmp.path().join("out/reporte_pacientes_Ana.xlsx");
        std::fs::create_dir_all(from.parent().unwrap()).unwrap();
        std::fs::create_dir_all(to.parent().unwrap()).unwrap();
        std::fs::write(&from, b"fresh").unwrap();
        std::fs::write(&to, b"stale").unwrap();

        promote(&from, &to).await.unwrap();

        assert_eq!(std::fs::read(&to).unwrap(), b"fresh");
        assert!(!from.exists());
    }

    #[tokio::test]
    async fn test_write_atomic_leaves_no_staging_file() {
        let tmp = TempDir::new().unwrap();
        let to = tmp.path().join("nested/a.xlsx");

        write_atomic(&to, b"bytes").await.unwrap();

        assert_eq!(std::fs::read(&to).unwrap(), b"bytes");
        assert!(!tmp.path().join("nested/a.xlsx.tmp").exists());
    }
}
