//! File persistence helpers.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::StoreError;

// ============================================================================
// Default Paths
// ============================================================================

/// Returns the default configuration directory.
///
/// - Linux: `~/.config/reportharvest`
/// - macOS: `~/Library/Application Support/reportharvest`
/// - Windows: `%APPDATA%\reportharvest`
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|c| c.join("reportharvest"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.json")
}

// ============================================================================
// File Operations
// ============================================================================

/// Saves data as pretty JSON, creating parent directories.
///
/// Writes to a sibling temp file first and renames it into place.
pub async fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(data)?;
    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, &json).await?;
    tokio::fs::rename(&temp_path, path).await?;

    debug!(path = %path.display(), bytes = json.len(), "JSON file saved");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Summary {
        accounts: usize,
        labels: Vec<String>,
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("reportharvest/config.json"));
    }

    #[tokio::test]
    async fn test_save_creates_parents_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("summary.json");
        let first = Summary {
            accounts: 1,
            labels: vec!["Ana".into()],
        };
        let second = Summary {
            accounts: 2,
            labels: vec!["Ana".into(), "Luis".into()],
        };

        save_json(&path, &first).await.unwrap();
        save_json(&path, &second).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Summary = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded, second);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
