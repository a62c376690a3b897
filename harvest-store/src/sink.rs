//! Dataset sinks.
//!
//! - [`CsvFileSink`] writes the merged grid to `{dir}/{prefix}{date}.csv`
//! - [`SheetsSink`] writes it into a dated sheet through a spreadsheet REST API

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use harvest_core::{CoreError, Dataset, DatasetSink};
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::SpreadsheetSinkConfig;
use crate::error::StoreError;

/// Widest column range cleared before a sheet is rewritten.
const CLEAR_COLUMNS: &str = "A:ZZ";

// ============================================================================
// CSV File
// ============================================================================

/// Writes the merged dataset as one CSV file per partition.
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    dir: PathBuf,
    prefix: String,
}

impl CsvFileSink {
    /// Creates a sink writing `{dir}/{prefix}{partition}.csv`.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// The file a partition is written to.
    pub fn path_for(&self, partition_key: &str) -> PathBuf {
        self.dir.join(format!("{}{partition_key}.csv", self.prefix))
    }

    fn encode(dataset: &Dataset) -> Result<Vec<u8>, StoreError> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        for row in dataset.rows() {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| StoreError::Io(e.into_error()))
    }

    async fn write(&self, path: &Path, dataset: &Dataset) -> Result<(), StoreError> {
        let bytes = Self::encode(dataset)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let temp = path.with_extension("csv.tmp");
        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl DatasetSink for CsvFileSink {
    fn name(&self) -> &str {
        "csv"
    }

    #[instrument(skip(self, dataset), fields(rows = dataset.row_count()))]
    async fn publish(&self, partition_key: &str, dataset: &Dataset) -> Result<(), CoreError> {
        let path = self.path_for(partition_key);
        self.write(&path, dataset)
            .await
            .map_err(|e| CoreError::sink(self.name(), e.to_string()))?;
        info!(path = %path.display(), "Merged dataset written");
        Ok(())
    }
}

// ============================================================================
// Spreadsheet REST API
// ============================================================================

/// Writes the merged dataset into a sheet named `{partition_prefix}{date}`.
///
/// Publishing creates the sheet (an existing one is reused), clears
/// `A:ZZ`, and writes the grid from `A1` with raw input.
pub struct SheetsSink {
    client: Client,
    api_base: Url,
    spreadsheet_id: String,
    token: String,
    partition_prefix: String,
}

impl std::fmt::Debug for SheetsSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsSink")
            .field("api_base", &self.api_base.as_str())
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("token", &"***")
            .finish_non_exhaustive()
    }
}

impl SheetsSink {
    /// Creates a sink with an explicit bearer token.
    pub fn new(config: &SpreadsheetSinkConfig, token: impl Into<String>) -> Result<Self, StoreError> {
        let api_base = Url::parse(&config.api_base)
            .map_err(|e| StoreError::Config(format!("invalid sheets api_base: {e}")))?;
        if api_base.cannot_be_a_base() {
            return Err(StoreError::Config(format!(
                "sheets api_base {api_base} cannot hold a path"
            )));
        }
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            api_base,
            spreadsheet_id: config.spreadsheet_id.clone(),
            token: token.into(),
            partition_prefix: config.partition_prefix.clone(),
        })
    }

    /// Creates a sink reading the token from `config.access_token_env`.
    pub fn from_env(config: &SpreadsheetSinkConfig) -> Result<Self, StoreError> {
        let token = std::env::var(&config.access_token_env).map_err(|_| {
            StoreError::Config(format!(
                "spreadsheet sink token variable {} is not set",
                config.access_token_env
            ))
        })?;
        Self::new(config, token)
    }

    /// The sheet a partition is written to.
    pub fn sheet_name(&self, partition_key: &str) -> String {
        format!("{}{partition_key}", self.partition_prefix)
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("spreadsheets");
            path.extend(segments);
        }
        url
    }

    async fn ensure_sheet(&self, sheet: &str) -> Result<(), StoreError> {
        let target = format!("{}:batchUpdate", self.spreadsheet_id);
        let url = self.url(&[target.as_str()]);
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": sheet } } }]
        });
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(sheet, "Sheet created");
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && text.contains("already exists") {
            debug!(sheet, "Sheet already exists, reusing it");
            return Ok(());
        }
        Err(StoreError::Sink(format!(
            "creating sheet {sheet} returned {status}: {text}"
        )))
    }

    async fn clear(&self, sheet: &str) -> Result<(), StoreError> {
        let range = format!("{sheet}!{CLEAR_COLUMNS}:clear");
        let url = self.url(&[self.spreadsheet_id.as_str(), "values", range.as_str()]);
        self.client
            .post(url)
            .bearer_auth(&self.token)
            .json(&json!({}))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn write_grid(&self, sheet: &str, dataset: &Dataset) -> Result<(), StoreError> {
        let range = format!("{sheet}!A1");
        let url = self.url(&[self.spreadsheet_id.as_str(), "values", range.as_str()]);
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": dataset.rows(),
        });
        self.client
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl DatasetSink for SheetsSink {
    fn name(&self) -> &str {
        "sheets"
    }

    #[instrument(skip(self, dataset), fields(rows = dataset.row_count()))]
    async fn publish(&self, partition_key: &str, dataset: &Dataset) -> Result<(), CoreError> {
        let sheet = self.sheet_name(partition_key);
        let sink_error = |e: StoreError| CoreError::sink("sheets", e.to_string());

        self.ensure_sheet(&sheet).await.map_err(sink_error)?;
        self.clear(&sheet).await.map_err(sink_error)?;
        self.write_grid(&sheet, dataset).await.map_err(sink_error)?;

        info!(sheet = %sheet, rows = dataset.row_count(), "Sheet updated");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
