//! Scripted browser doubles for the portal integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use harvest_core::{ElementLocator, LocatorChain, PortalDescriptor, Selector};
use harvest_fetch::{BrowserError, Cookie, PageDriver, SessionFactory};

pub const LOGIN_URL: &str = "https://portal.example/login";
pub const REPORT_URL: &str = "https://portal.example/reporte/pacientes";
pub const HOME_URL: &str = "https://portal.example/home";

pub fn portal() -> PortalDescriptor {
    PortalDescriptor::new(LOGIN_URL, REPORT_URL)
}

/// What a click does to the page.
#[derive(Debug, Clone)]
pub enum Effect {
    /// The browser moves to a new address.
    Navigate(String),
    /// A file appears on disk, as a finished download would.
    WriteFile(PathBuf, Vec<u8>),
    /// The page hands a blob to the capture hook.
    SetCapture(String),
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub url: String,
    pub html: String,
    pub counts: HashMap<Selector, usize>,
    pub redirects: HashMap<String, String>,
    pub on_click: HashMap<String, Vec<Effect>>,
    pub form_submit_url: Option<String>,
    pub ready: bool,
    pub capture: Option<String>,
    pub cookies: Vec<Cookie>,
    pub fills: Vec<(String, String)>,
    pub clicks: Vec<String>,
    pub form_submits: usize,
    pub screenshots: Vec<PathBuf>,
    pub closed: usize,
    pub opened: usize,
    pub hang_goto: bool,
}

impl FakeState {
    /// Makes every locator of the chain's first strategy present.
    pub fn show(&mut self, chain: &LocatorChain) {
        if let Some(strategy) = chain.strategies().first() {
            for locator in strategy.targets.values() {
                self.counts.insert(locator.selector.clone(), locator.nth + 1);
            }
        }
    }

    /// Registers effects for clicks on the first strategy's `role` locator.
    pub fn when_clicked(&mut self, chain: &LocatorChain, role: &str, effects: Vec<Effect>) {
        if let Some(locator) = chain.strategies().first().and_then(|s| s.targets.get(role)) {
            self.on_click.insert(locator.to_string(), effects);
        }
    }

    /// A portal where login and the query both work.
    pub fn working(portal: &PortalDescriptor) -> Self {
        let mut state = Self {
            ready: true,
            ..Self::default()
        };
        state.show(&portal.login_fields);
        state.show(&portal.login_submit);
        state.show(&portal.date_fields);
        state.show(&portal.query_submit);
        state.when_clicked(
            &portal.login_submit,
            "submit",
            vec![Effect::Navigate(HOME_URL.to_string())],
        );
        state
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Navigate(url) => self.url = url,
            Effect::WriteFile(path, bytes) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).unwrap();
                }
                std::fs::write(path, bytes).unwrap();
            }
            Effect::SetCapture(encoded) => self.capture = Some(encoded),
        }
    }
}

pub type Shared = Arc<Mutex<FakeState>>;

pub fn shared(state: FakeState) -> Shared {
    Arc::new(Mutex::new(state))
}

/// A page whose behavior is read from a [`FakeState`].
#[derive(Clone)]
pub struct FakePage {
    pub state: Shared,
    pub downloads: Option<PathBuf>,
}

impl FakePage {
    pub fn new(state: Shared) -> Self {
        Self {
            state,
            downloads: None,
        }
    }

    pub fn with_downloads(mut self, dir: impl Into<PathBuf>) -> Self {
        self.downloads = Some(dir.into());
        self
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        if self.lock().hang_goto {
            std::future::pending::<()>().await;
        }
        let mut state = self.lock();
        let target = state.redirects.get(url).cloned().unwrap_or_else(|| url.to_string());
        state.url = target;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.lock().url.clone())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.lock().html.clone())
    }

    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, BrowserError> {
        let mut state = self.lock();
        if expression.contains("f.submit()") {
            state.form_submits += 1;
            return Ok(match state.form_submit_url.clone() {
                Some(url) => {
                    state.url = url;
                    serde_json::Value::Bool(true)
                }
                None => serde_json::Value::Bool(false),
            });
        }
        if expression.contains("createObjectURL") {
            state.capture = None;
            return Ok(serde_json::Value::Bool(true));
        }
        if expression.contains("__harvestCapture") {
            return Ok(state
                .capture
                .clone()
                .map_or(serde_json::Value::Null, serde_json::Value::String));
        }
        Ok(serde_json::Value::Bool(state.ready))
    }

    async fn count(&self, selector: &Selector) -> Result<usize, BrowserError> {
        Ok(self.lock().counts.get(selector).copied().unwrap_or(0))
    }

    async fn fill(&self, locator: &ElementLocator, value: &str) -> Result<(), BrowserError> {
        self.lock().fills.push((locator.to_string(), value.to_string()));
        Ok(())
    }

    async fn click(&self, locator: &ElementLocator) -> Result<(), BrowserError> {
        let mut state = self.lock();
        let key = locator.to_string();
        state.clicks.push(key.clone());
        let effects = state.on_click.get(&key).cloned().unwrap_or_default();
        for effect in effects {
            state.apply(effect);
        }
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<Cookie>, BrowserError> {
        Ok(self.lock().cookies.clone())
    }

    async fn user_agent(&self) -> Result<String, BrowserError> {
        Ok("FakeAgent/1.0".to_string())
    }

    async fn screenshot(&self, path: &Path) -> Result<(), BrowserError> {
        self.lock().screenshots.push(path.to_path_buf());
        Ok(())
    }

    fn download_dir(&self) -> Option<&Path> {
        self.downloads.as_deref()
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.lock().closed += 1;
        Ok(())
    }
}

/// Hands out pages sharing one [`FakeState`].
pub struct FakeFactory {
    pub state: Shared,
    pub downloads: Option<PathBuf>,
    pub fail: bool,
}

impl FakeFactory {
    pub fn new(state: Shared) -> Self {
        Self {
            state,
            downloads: None,
            fail: false,
        }
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn open(&self, _label: &str) -> Result<Box<dyn PageDriver>, BrowserError> {
        if self.fail {
            return Err(BrowserError::Launch("no browser here".to_string()));
        }
        self.state.lock().unwrap().opened += 1;
        let mut page = FakePage::new(Arc::clone(&self.state));
        page.downloads.clone_from(&self.downloads);
        Ok(Box::new(page))
    }
}

/// File names of recorded screenshots.
pub fn screenshot_names(state: &Shared) -> Vec<String> {
    state
        .lock()
        .unwrap()
        .screenshots
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .collect()
}
