//! Test doubles shared by this crate's unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use harvest_core::{ElementLocator, ReportQuery, Selector};

use crate::clock::ManualClock;
use crate::context::{AcquireContext, AcquireSettings};
use crate::error::BrowserError;
use crate::host::browser::{Cookie, PageDriver};
use crate::host::http::HttpClient;

/// A page that answers element counts from a table and records probes.
#[derive(Default)]
pub struct StubPage {
    pub counts: HashMap<Selector, usize>,
    pub probed: Mutex<Vec<Selector>>,
}

impl StubPage {
    pub fn with(mut self, selector: Selector, n: usize) -> Self {
        self.counts.insert(selector, n);
        self
    }
}

#[async_trait]
impl PageDriver for StubPage {
    async fn goto(&self, _url: &str) -> Result<(), BrowserError> {
        Ok(())
    }
    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok("https://portal.example/reporte".to_string())
    }
    async fn content(&self) -> Result<String, BrowserError> {
        Ok(String::new())
    }
    async fn evaluate(&self, _e: &str) -> Result<serde_json::Value, BrowserError> {
        Ok(serde_json::Value::Null)
    }
    async fn count(&self, selector: &Selector) -> Result<usize, BrowserError> {
        self.probed.lock().unwrap().push(selector.clone());
        if matches!(selector, Selector::Xpath(x) if x == "//broken[") {
            return Err(BrowserError::Script("bad xpath".into()));
        }
        Ok(self.counts.get(selector).copied().unwrap_or(0))
    }
    async fn fill(&self, _l: &ElementLocator, _v: &str) -> Result<(), BrowserError> {
        Ok(())
    }
    async fn click(&self, _l: &ElementLocator) -> Result<(), BrowserError> {
        Ok(())
    }
    async fn cookies(&self) -> Result<Vec<Cookie>, BrowserError> {
        Ok(vec![])
    }
    async fn user_agent(&self) -> Result<String, BrowserError> {
        Ok("StubAgent/1.0".to_string())
    }
    async fn screenshot(&self, _p: &Path) -> Result<(), BrowserError> {
        Ok(())
    }
    fn download_dir(&self) -> Option<&Path> {
        None
    }
    async fn close(&self) -> Result<(), BrowserError> {
        Ok(())
    }
}

/// Owned pieces an [`AcquireContext`] borrows from.
pub struct ContextFixture {
    pub page: StubPage,
    pub query: ReportQuery,
    pub canonical: PathBuf,
    pub downloads: PathBuf,
    pub http: HttpClient,
    pub clock: ManualClock,
    pub settings: AcquireSettings,
    _dir: tempfile::TempDir,
}

impl ContextFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let day = chrono::NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        Self {
            page: StubPage::default(),
            query: ReportQuery::single_day(day),
            canonical: dir.path().join("reporte_pacientes_Ana.xlsx"),
            downloads: dir.path().join("incoming"),
            http: HttpClient::new().unwrap(),
            clock: ManualClock::new(),
            settings: AcquireSettings::default(),
            _dir: dir,
        }
    }

    pub fn ctx(&self) -> AcquireContext<'_> {
        AcquireContext {
            page: &self.page,
            query: &self.query,
            account_label: "Ana",
            canonical_path: &self.canonical,
            download_dir: &self.downloads,
            http: &self.http,
            clock: &self.clock,
            settings: &self.settings,
        }
    }
}
