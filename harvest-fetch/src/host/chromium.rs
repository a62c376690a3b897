//! Headless Chromium sessions via `chromiumoxide`.
//!
//! Each account gets its own browser process with its own profile and
//! download directory, so concurrent accounts never see each other's
//! cookies or files. Element operations are expressed as small scripts that
//! resolve a CSS or XPath selector in the page, which keeps both selector
//! kinds on one code path.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use harvest_core::{sanitize_label, ElementLocator, Selector};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use super::browser::{Cookie, PageDriver, SessionFactory};
use crate::error::BrowserError;

/// Environment variable that overrides Chromium discovery.
pub const CHROMIUM_PATH_ENV: &str = "HARVEST_CHROMIUM_PATH";

/// Executables probed on `PATH`, in order.
const CHROMIUM_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

// ============================================================================
// Discovery
// ============================================================================

/// Finds a Chromium executable.
///
/// Order: explicit override, `HARVEST_CHROMIUM_PATH`, then `PATH`.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    CHROMIUM_CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok())
}

// ============================================================================
// Launcher
// ============================================================================

/// How to start per-account browsers.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Executable override.
    pub executable: Option<PathBuf>,
    /// Run without a visible window.
    pub headless: bool,
    /// Viewport width and height.
    pub window: (u32, u32),
    /// User agent override.
    pub user_agent: Option<String>,
    /// Parent of the per-account download directories.
    pub download_root: PathBuf,
    /// Parent of the per-account throwaway profiles.
    pub profile_root: PathBuf,
    /// Budget for any single browser operation.
    pub operation_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        let scratch = std::env::temp_dir().join("harvest");
        Self {
            executable: None,
            headless: true,
            window: (1920, 1080),
            user_agent: None,
            download_root: scratch.join("downloads"),
            profile_root: scratch.join("profiles"),
            operation_timeout: Duration::from_secs(60),
        }
    }
}

/// Launches one Chromium process per account.
#[derive(Debug)]
pub struct ChromiumLauncher {
    options: LaunchOptions,
    launched: AtomicUsize,
}

impl ChromiumLauncher {
    /// Creates a launcher.
    pub fn new(options: LaunchOptions) -> Self {
        Self {
            options,
            launched: AtomicUsize::new(0),
        }
    }

    fn config(&self, executable: PathBuf, profile: &Path) -> Result<BrowserConfig, BrowserError> {
        let (width, height) = self.options.window;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .user_data_dir(profile)
            .window_size(width, height)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--no-first-run");

        if self.options.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        if let Some(ref ua) = self.options.user_agent {
            builder = builder.arg(format!("--user-agent={ua}"));
        }

        builder.build().map_err(BrowserError::Launch)
    }
}

#[async_trait]
impl SessionFactory for ChromiumLauncher {
    #[instrument(skip(self), fields(account = %label))]
    async fn open(&self, label: &str) -> Result<Box<dyn PageDriver>, BrowserError> {
        let executable = find_chromium(self.options.executable.as_deref()).ok_or_else(|| {
            BrowserError::NotFound(format!(
                "no Chromium executable found; set {CHROMIUM_PATH_ENV} or browser.executable"
            ))
        })?;

        let seq = self.launched.fetch_add(1, Ordering::Relaxed);
        let slug = format!("{}-{}-{seq}", sanitize_label(label), std::process::id());
        let profile = self.options.profile_root.join(&slug);
        let downloads = self.options.download_root.join(&slug);
        tokio::fs::create_dir_all(&profile).await?;
        tokio::fs::create_dir_all(&downloads).await?;

        debug!(executable = %executable.display(), profile = %profile.display(), "Launching Chromium");
        let config = self.config(executable, &profile)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    trace!(error = %err, "Browser handler event error");
                }
            }
        });

        let mut session = ChromiumPage {
            browser: Mutex::new(Some(browser)),
            page: None,
            events,
            profile,
            downloads,
            timeout: self.options.operation_timeout,
        };

        if let Err(err) = session.prepare().await {
            // The process is already running; tear it down before reporting.
            let _ = session.close().await;
            return Err(err);
        }

        info!("Browser session ready");
        Ok(Box::new(session))
    }
}

// ============================================================================
// Page
// ============================================================================

/// A Chromium page with its own browser process.
pub struct ChromiumPage {
    browser: Mutex<Option<Browser>>,
    page: Option<Page>,
    events: JoinHandle<()>,
    profile: PathBuf,
    downloads: PathBuf,
    timeout: Duration,
}

impl std::fmt::Debug for ChromiumPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumPage")
            .field("profile", &self.profile)
            .field("downloads", &self.downloads)
            .finish_non_exhaustive()
    }
}

impl ChromiumPage {
    async fn prepare(&mut self) -> Result<(), BrowserError> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| BrowserError::Protocol("browser already closed".into()))?;

        let page = bounded(self.timeout, "open page", browser.new_page("about:blank")).await?;

        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(self.downloads.to_string_lossy().into_owned())
            .build()
            .map_err(BrowserError::Protocol)?;
        bounded(self.timeout, "enable downloads", browser.execute(params)).await?;

        drop(guard);
        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> Result<&Page, BrowserError> {
        self.page
            .as_ref()
            .ok_or_else(|| BrowserError::Protocol("page not open".into()))
    }

    async fn eval<T: DeserializeOwned>(&self, expression: &str) -> Result<T, BrowserError> {
        let page = self.page()?;
        let result = bounded(self.timeout, "evaluate", page.evaluate(expression)).await?;
        result
            .into_value()
            .map_err(|e| BrowserError::Script(format!("unexpected script result: {e:?}")))
    }

    async fn on_element(
        &self,
        locator: &ElementLocator,
        action: &str,
    ) -> Result<(), BrowserError> {
        let script = element_script(locator, action);
        let found: bool = self.eval(&script).await?;
        if found {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound(format!(
                "{} [{}]",
                locator.selector, locator.nth
            )))
        }
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    #[instrument(skip(self))]
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let page = self.page()?;
        bounded(self.timeout, "navigate", page.goto(url)).await?;
        bounded(self.timeout, "load", page.wait_for_navigation()).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let page = self.page()?;
        let url = bounded(self.timeout, "read url", page.url()).await?;
        Ok(url.map(|u| u.to_string()).unwrap_or_default())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.eval("document.documentElement.outerHTML").await
    }

    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, BrowserError> {
        self.eval(expression).await
    }

    async fn count(&self, selector: &Selector) -> Result<usize, BrowserError> {
        self.eval(&format!("({}).length", elements_expression(selector)))
            .await
    }

    async fn fill(&self, locator: &ElementLocator, value: &str) -> Result<(), BrowserError> {
        let value = js_string(value);
        let action = format!(
            "el.focus(); \
             const setter = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value'); \
             if (setter && setter.set) {{ setter.set.call(el, {value}); }} else {{ el.value = {value}; }} \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }}));"
        );
        self.on_element(locator, &action).await
    }

    async fn click(&self, locator: &ElementLocator) -> Result<(), BrowserError> {
        self.on_element(locator, "el.scrollIntoView({ block: 'center' }); el.click();")
            .await
    }

    #[allow(clippy::cast_possible_truncation)]
    async fn cookies(&self) -> Result<Vec<Cookie>, BrowserError> {
        let page = self.page()?;
        let raw = bounded(self.timeout, "read cookies", page.get_cookies()).await?;
        Ok(raw
            .into_iter()
            .map(|c| Cookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                expires: (c.expires > 0.0)
                    .then(|| Utc.timestamp_opt(c.expires as i64, 0).single())
                    .flatten(),
                secure: c.secure,
                http_only: c.http_only,
            })
            .collect())
    }

    async fn user_agent(&self) -> Result<String, BrowserError> {
        self.eval("navigator.userAgent").await
    }

    async fn screenshot(&self, path: &Path) -> Result<(), BrowserError> {
        let page = self.page()?;
        let params = ScreenshotParams::builder().full_page(true).build();
        bounded(self.timeout, "screenshot", page.save_screenshot(params, path)).await?;
        Ok(())
    }

    fn download_dir(&self) -> Option<&Path> {
        Some(&self.downloads)
    }

    #[instrument(skip(self))]
    async fn close(&self) -> Result<(), BrowserError> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };

        if let Some(page) = self.page.clone() {
            if let Err(err) = page.close().await {
                debug!(error = %err, "Page close failed");
            }
        }
        let closed = bounded(self.timeout, "close browser", browser.close()).await;
        if let Err(ref err) = closed {
            warn!(error = %err, "Browser did not close cleanly, killing");
            let _ = browser.kill().await;
        }
        let _ = browser.wait().await;
        self.events.abort();

        remove_session_dirs(&[self.profile.as_path(), self.downloads.as_path()]).await;
        debug!("Browser session closed");
        closed.map(|_| ())
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn bounded<T, E: std::fmt::Display>(
    timeout: Duration,
    operation: &str,
    fut: impl std::future::Future<Output = Result<T, E>>,
) -> Result<T, BrowserError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(BrowserError::Protocol(format!("{operation}: {err}"))),
        Err(_) => Err(BrowserError::Timeout {
            operation: operation.to_string(),
            after: timeout,
        }),
    }
}

/// Removes a closed session's scratch directories. Promoted artifacts live
/// elsewhere, so anything left here is an abandoned partial download.
async fn remove_session_dirs(dirs: &[&Path]) {
    for dir in dirs {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => debug!(error = %err, dir = %dir.display(), "Session cleanup failed"),
        }
    }
}

/// JSON-encodes a string for splicing into a script.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// A script expression evaluating to an array of the elements `selector`
/// matches, in document order.
fn elements_expression(selector: &Selector) -> String {
    match selector {
        Selector::Css(css) => {
            format!("Array.from(document.querySelectorAll({}))", js_string(css))
        }
        Selector::Xpath(xpath) => format!(
            "(() => {{ const r = document.evaluate({}, document, null, \
             XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); const out = []; \
             for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i)); \
             return out; }})()",
            js_string(xpath)
        ),
    }
}

/// A script that runs `action` with `el` bound to the located element and
/// evaluates to whether the element existed.
fn element_script(locator: &ElementLocator, action: &str) -> String {
    format!(
        "(() => {{ const el = ({})[{}]; if (!el) return false; {action} return true; }})()",
        elements_expression(&locator.selector),
        locator.nth
    )
}

// ============================================================================
// Tests
// ============================================================================
