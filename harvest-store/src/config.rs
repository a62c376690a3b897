//! Run configuration.
//!
//! One JSON file describes the portal, the accounts, and every budget and
//! destination of a run. It is loaded once and passed down; nothing reads
//! ambient globals after that, apart from secrets named by environment
//! variable.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use harvest_core::{
    sanitize_label, AccountCredential, PortalDescriptor, ReportQuery, Secret, WaitSettings,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::persistence::default_config_path;

// ============================================================================
// Top Level
// ============================================================================

/// The whole run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// The remote portal.
    pub portal: PortalDescriptor,
    /// Accounts, in processing and merge order.
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    /// Where per-account artifacts and the merged file are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Where diagnostic screenshots go. None disables them.
    #[serde(default)]
    pub diagnostics_dir: Option<PathBuf>,
    /// Extension of per-account artifacts.
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,
    /// Per-account artifact file name prefix.
    #[serde(default = "default_artifact_prefix")]
    pub artifact_prefix: String,
    /// Merged file name prefix; the reporting date follows.
    #[serde(default = "default_merged_prefix")]
    pub merged_prefix: String,
    /// Which day to report on.
    #[serde(default)]
    pub report: ReportConfig,
    /// Wait budgets.
    #[serde(default)]
    pub waits: WaitsConfig,
    /// Acquisition settings.
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    /// Browser settings.
    #[serde(default)]
    pub browser: BrowserConfig,
    /// How many accounts run at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Destinations for the merged dataset.
    #[serde(default)]
    pub sinks: SinksConfig,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("descargas")
}

fn default_artifact_extension() -> String {
    "xlsx".to_string()
}

fn default_artifact_prefix() -> String {
    "reporte_pacientes_".to_string()
}

fn default_merged_prefix() -> String {
    "reporte_pacientes_combinado_".to_string()
}

fn default_concurrency() -> usize {
    1
}

// ============================================================================
// Accounts
// ============================================================================

/// One account entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Human label.
    pub label: String,
    /// Login identity.
    pub identity: String,
    /// Login secret, inline or from the environment.
    pub secret: SecretSource,
}

/// Where an account secret comes from.
///
/// ```json
/// "secret": "inline value"
/// "secret": { "env": "ANA_PASSWORD" }
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecretSource {
    /// Read from an environment variable at resolve time.
    Env {
        /// Variable name.
        env: String,
    },
    /// Given inline.
    Inline(String),
}

impl std::fmt::Debug for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Env { env } => f.debug_struct("Env").field("env", env).finish(),
            Self::Inline(_) => f.write_str("Inline(***)"),
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Which day the report covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Days before today; 1 is yesterday.
    pub days_back: u64,
    /// A fixed date, overriding `days_back`.
    pub date: Option<NaiveDate>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            days_back: 1,
            date: None,
        }
    }
}

impl ReportConfig {
    /// The single-day query for a run started on `today`.
    pub fn query(&self, today: NaiveDate) -> ReportQuery {
        match self.date {
            Some(day) => ReportQuery::single_day(day),
            None => ReportQuery::days_before(today, self.days_back),
        }
    }
}

/// Wait budgets plus the run-wide deadline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaitsConfig {
    /// Per-wait budgets.
    #[serde(flatten)]
    pub budgets: WaitSettings,
    /// Whole-run deadline in seconds. In-flight accounts are cancelled
    /// when it passes.
    #[serde(default)]
    pub run_deadline_secs: Option<u64>,
}

impl WaitsConfig {
    /// The run deadline, if any.
    pub fn run_deadline(&self) -> Option<Duration> {
        self.run_deadline_secs.map(Duration::from_secs)
    }
}

/// Acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Smallest replayed payload accepted as a report.
    pub min_payload_bytes: usize,
    /// Strategy ids in run order. None means the default order.
    pub strategies: Option<Vec<String>>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            min_payload_bytes: 1024,
            strategies: None,
        }
    }
}

/// Browser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Chromium executable. Searched for when absent.
    pub executable: Option<PathBuf>,
    /// Run without a window.
    pub headless: bool,
    /// Window width in pixels.
    pub window_width: u32,
    /// Window height in pixels.
    pub window_height: u32,
    /// User agent override.
    pub user_agent: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            window_width: 1920,
            window_height: 1080,
            user_agent: None,
        }
    }
}

/// Destinations for the merged dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SinksConfig {
    /// Directory for the merged CSV. Defaults to `output_dir`.
    pub csv_dir: Option<PathBuf>,
    /// Spreadsheet REST sink.
    pub spreadsheet: Option<SpreadsheetSinkConfig>,
}

/// Spreadsheet REST sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadsheetSinkConfig {
    /// Target spreadsheet.
    pub spreadsheet_id: String,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,
    /// API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Sheet name prefix; the reporting date follows.
    #[serde(default = "default_partition_prefix")]
    pub partition_prefix: String,
}

fn default_access_token_env() -> String {
    "HARVEST_SHEETS_TOKEN".to_string()
}

fn default_api_base() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}

fn default_partition_prefix() -> String {
    "Pacientes_".to_string()
}

// ============================================================================
// Loading and Validation
// ============================================================================

impl HarvestConfig {
    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        default_config_path()
    }

    /// Loads and validates configuration from `path`.
    pub fn load_from(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_json(&content)?;
        info!(
            path = %path.display(),
            accounts = config.accounts.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parses and validates configuration text.
    pub fn from_json(content: &str) -> Result<Self, StoreError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks everything that does not need the environment.
    pub fn validate(&self) -> Result<(), StoreError> {
        self.portal.validate()?;

        if self.accounts.is_empty() {
            return Err(StoreError::Config("no accounts configured".into()));
        }
        let mut seen = HashSet::new();
        for account in &self.accounts {
            if account.label.trim().is_empty() {
                return Err(StoreError::Config("an account has an empty label".into()));
            }
            if account.identity.trim().is_empty() {
                return Err(StoreError::Config(format!(
                    "account {} has an empty identity",
                    account.label
                )));
            }
            // Labels name artifact files, so they must stay distinct once sanitized.
            if !seen.insert(sanitize_label(&account.label)) {
                return Err(StoreError::Config(format!(
                    "account label {} collides with another account",
                    account.label
                )));
            }
        }

        if self.concurrency == 0 {
            return Err(StoreError::Config("concurrency must be at least 1".into()));
        }
        if self.artifact_extension.trim_start_matches('.').is_empty() {
            return Err(StoreError::Config("artifact_extension is empty".into()));
        }
        if let Some(ref sheet) = self.sinks.spreadsheet {
            if sheet.spreadsheet_id.trim().is_empty() {
                return Err(StoreError::Config("sinks.spreadsheet.spreadsheet_id is empty".into()));
            }
        }
        debug!("Configuration valid");
        Ok(())
    }

    /// Resolves every account secret from the process environment.
    pub fn resolve_accounts(&self) -> Result<Vec<AccountCredential>, StoreError> {
        self.resolve_accounts_with(|var| std::env::var(var).ok())
    }

    /// Resolves every account secret, looking variables up with `lookup`.
    pub fn resolve_accounts_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Vec<AccountCredential>, StoreError> {
        self.accounts
            .iter()
            .map(|account| {
                let secret = match &account.secret {
                    SecretSource::Inline(value) => value.clone(),
                    SecretSource::Env { env } => {
                        lookup(env).ok_or_else(|| StoreError::MissingSecret {
                            label: account.label.clone(),
                            var: env.clone(),
                        })?
                    }
                };
                Ok(AccountCredential::new(
                    account.label.clone(),
                    account.identity.clone(),
                    Secret::new(secret),
                ))
            })
            .collect()
    }

    /// Labels in configured order.
    pub fn account_labels(&self) -> Vec<String> {
        self.accounts.iter().map(|a| a.label.clone()).collect()
    }

    /// Directory for the merged CSV.
    pub fn csv_dir(&self) -> &Path {
        self.sinks.csv_dir.as_deref().unwrap_or(&self.output_dir)
    }
}

// ============================================================================
// Tests
// ============================================================================
