//! Portal descriptor: every URL, locator, endpoint and wait budget needed to
//! drive the remote report portal.
//!
//! Nothing about the portal's page structure is hardcoded elsewhere. The
//! defaults below describe the layout the portal had when this was written;
//! any of them can be overridden from the configuration file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::locator::{ElementLocator, LocatorChain, LocatorStrategy};
use crate::error::CoreError;

/// Role names used by the default locator chains.
pub mod roles {
    /// Login identity input.
    pub const IDENTITY: &str = "identity";
    /// Login secret input.
    pub const SECRET: &str = "secret";
    /// A submit control.
    pub const SUBMIT: &str = "submit";
    /// Range start date input.
    pub const START: &str = "start";
    /// Range end date input.
    pub const END: &str = "end";
    /// The control that triggers the report download.
    pub const DOWNLOAD: &str = "download";
}

// ============================================================================
// Portal Descriptor
// ============================================================================

/// Full description of the remote portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalDescriptor {
    /// Login page URL.
    pub login_url: String,
    /// Report view URL.
    pub report_url: String,
    /// Case-insensitive URL substring that identifies the login surface.
    #[serde(default = "default_login_marker")]
    pub login_marker: String,

    /// Identity and secret inputs.
    #[serde(default = "default_login_fields")]
    pub login_fields: LocatorChain,
    /// Login submit control.
    #[serde(default = "default_login_submit")]
    pub login_submit: LocatorChain,
    /// Script that submits the login form when the submit control did nothing.
    #[serde(default = "default_form_submit_script")]
    pub form_submit_script: String,

    /// Range start/end inputs.
    #[serde(default = "default_date_fields")]
    pub date_fields: LocatorChain,
    /// Query submit control.
    #[serde(default = "default_query_submit")]
    pub query_submit: LocatorChain,
    /// Report download control.
    #[serde(default = "default_download_control")]
    pub download_control: LocatorChain,

    /// Text fragments that identify download links and buttons in page HTML.
    #[serde(default = "default_download_keywords")]
    pub download_keywords: Vec<String>,
    /// Endpoint suffixes tried, relative to the report view, when no explicit
    /// download target is discoverable.
    #[serde(default = "default_endpoint_suffixes")]
    pub endpoint_suffixes: Vec<String>,
    /// CSS selectors for anti-forgery tokens (`meta[content]` or `input[value]`).
    #[serde(default = "default_csrf_selectors")]
    pub csrf_selectors: Vec<String>,
    /// Query parameter names.
    #[serde(default)]
    pub query_params: QueryParams,

    /// JavaScript expression that evaluates to `true` once the page is ready.
    #[serde(default = "default_ready_expression")]
    pub ready_expression: String,
}

impl PortalDescriptor {
    /// Creates a descriptor with default locators for the given URLs.
    pub fn new(login_url: impl Into<String>, report_url: impl Into<String>) -> Self {
        Self {
            login_url: login_url.into(),
            report_url: report_url.into(),
            login_marker: default_login_marker(),
            login_fields: default_login_fields(),
            login_submit: default_login_submit(),
            form_submit_script: default_form_submit_script(),
            date_fields: default_date_fields(),
            query_submit: default_query_submit(),
            download_control: default_download_control(),
            download_keywords: default_download_keywords(),
            endpoint_suffixes: default_endpoint_suffixes(),
            csrf_selectors: default_csrf_selectors(),
            query_params: QueryParams::default(),
            ready_expression: default_ready_expression(),
        }
    }

    /// Returns true if `url` points at the login surface.
    pub fn is_login_url(&self, url: &str) -> bool {
        !self.login_marker.is_empty()
            && url
                .to_lowercase()
                .contains(&self.login_marker.to_lowercase())
    }

    /// Checks that URLs are present and every chain has at least one strategy.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.login_url.trim().is_empty() {
            return Err(CoreError::InvalidConfig("portal.login_url is empty".into()));
        }
        if self.report_url.trim().is_empty() {
            return Err(CoreError::InvalidConfig("portal.report_url is empty".into()));
        }
        let chains = [
            ("login_fields", &self.login_fields),
            ("login_submit", &self.login_submit),
            ("date_fields", &self.date_fields),
            ("query_submit", &self.query_submit),
            ("download_control", &self.download_control),
        ];
        for (name, chain) in chains {
            if chain.is_empty() {
                return Err(CoreError::InvalidConfig(format!(
                    "portal.{name} has no locator strategies"
                )));
            }
        }
        Ok(())
    }
}

/// Query parameter names used when requesting the report directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    /// Range start parameter.
    pub start: String,
    /// Range end parameter.
    pub end: String,
    /// Anti-forgery token parameter, used when the token element has no name.
    pub csrf: String,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            start: "desde_inicio_cita".to_string(),
            end: "hasta_inicio_cita".to_string(),
            csrf: "_token".to_string(),
        }
    }
}

// ============================================================================
// Defaults
// ============================================================================

fn default_login_marker() -> String {
    "login".to_string()
}

fn default_login_fields() -> LocatorChain {
    use roles::{IDENTITY, SECRET};
    LocatorChain::new(vec![
        LocatorStrategy::new("by-name")
            .target(IDENTITY, ElementLocator::css("input[name='email']"))
            .target(SECRET, ElementLocator::css("input[name='password']")),
        LocatorStrategy::new("by-type")
            .target(IDENTITY, ElementLocator::css("input[type='email']"))
            .target(SECRET, ElementLocator::css("input[type='password']")),
        LocatorStrategy::new("by-id")
            .target(IDENTITY, ElementLocator::css("#email"))
            .target(SECRET, ElementLocator::css("#password")),
    ])
}

fn default_login_submit() -> LocatorChain {
    use roles::SUBMIT;
    LocatorChain::new(vec![
        LocatorStrategy::new("submit-type")
            .target(SUBMIT, ElementLocator::css("button[type='submit']")),
        LocatorStrategy::new("by-text").target(
            SUBMIT,
            ElementLocator::xpath(
                "//button[contains(text(), 'Ingresar') or contains(text(), 'Login') or contains(text(), 'Entrar')]",
            ),
        ),
        LocatorStrategy::new("first-button").target(SUBMIT, ElementLocator::css("button")),
    ])
}

fn default_form_submit_script() -> String {
    "(() => { const f = document.querySelector('form'); if (!f) return false; f.submit(); return true; })()"
        .to_string()
}

fn default_date_fields() -> LocatorChain {
    use roles::{END, START};
    LocatorChain::new(vec![
        LocatorStrategy::new("by-id")
            .target(START, ElementLocator::css("#desde_inicio_cita"))
            .target(END, ElementLocator::css("#hasta_inicio_cita")),
        LocatorStrategy::new("by-name")
            .target(START, ElementLocator::css("input[name='desde_inicio_cita']"))
            .target(END, ElementLocator::css("input[name='hasta_inicio_cita']")),
        LocatorStrategy::new("by-type")
            .target(START, ElementLocator::css("input[type='date']"))
            .target(END, ElementLocator::css("input[type='date']").nth(1)),
        LocatorStrategy::new("by-placeholder")
            .target(
                START,
                ElementLocator::xpath(
                    "//input[contains(@placeholder, 'desde') or contains(@placeholder, 'inicio') or contains(@placeholder, 'Desde')]",
                ),
            )
            .target(
                END,
                ElementLocator::xpath(
                    "//input[contains(@placeholder, 'hasta') or contains(@placeholder, 'fin') or contains(@placeholder, 'Hasta')]",
                ),
            ),
    ])
}

fn default_query_submit() -> LocatorChain {
    use roles::SUBMIT;
    LocatorChain::new(vec![
        LocatorStrategy::new("by-text")
            .target(SUBMIT, ElementLocator::xpath("//button[contains(text(), 'Enviar')]")),
        LocatorStrategy::new("submit-type")
            .target(SUBMIT, ElementLocator::css("button[type='submit']")),
    ])
}

fn default_download_control() -> LocatorChain {
    use roles::DOWNLOAD;
    let text_match = "contains(text(), 'Descargar') or contains(text(), 'Exportar') or contains(text(), 'Excel') or contains(text(), 'Export')";
    LocatorChain::new(vec![
        LocatorStrategy::new("button-text")
            .target(DOWNLOAD, ElementLocator::xpath(format!("//button[{text_match}]"))),
        LocatorStrategy::new("link-text")
            .target(DOWNLOAD, ElementLocator::xpath(format!("//a[{text_match}]"))),
        LocatorStrategy::new("icon-parent").target(
            DOWNLOAD,
            ElementLocator::xpath(
                "//*[self::button or self::a][.//i[contains(@class, 'download') or contains(@class, 'file')]]",
            ),
        ),
    ])
}

fn default_download_keywords() -> Vec<String> {
    ["Descargar", "Exportar", "Excel", "Export"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_endpoint_suffixes() -> Vec<String> {
    ["/exportar", "/export", "/excel", "/descargar", "/download"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_csrf_selectors() -> Vec<String> {
    ["meta[name='csrf-token']", "input[name='_token']"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_ready_expression() -> String {
    "document.readyState === 'complete' && !document.querySelector('.loading, .spinner, [aria-busy=\"true\"]')"
        .to_string()
}

// ============================================================================
// Wait Settings
// ============================================================================

/// Bounded wait budgets. Every wait in the system is a poll against a
/// predicate with one of these timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitSettings {
    /// Page readiness after navigation, in seconds.
    pub page_ready_secs: u64,
    /// Leaving the login surface after submitting credentials, in seconds.
    pub login_secs: u64,
    /// Results view settling after the query is submitted, in seconds.
    pub results_secs: u64,
    /// Download file materialization, in seconds.
    pub download_secs: u64,
    /// In-page resource capture, in seconds.
    pub capture_secs: u64,
    /// HTTP request timeout for replayed requests, in seconds.
    pub http_secs: u64,
    /// Interval between predicate checks, in milliseconds.
    pub poll_interval_ms: u64,
    /// Consecutive successful readiness checks required to call a page stable.
    pub settle_polls: u32,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            page_ready_secs: 20,
            login_secs: 15,
            results_secs: 20,
            download_secs: 30,
            capture_secs: 20,
            http_secs: 60,
            poll_interval_ms: 500,
            settle_polls: 2,
        }
    }
}

impl WaitSettings {
    /// Page readiness timeout.
    pub fn page_ready(&self) -> Duration {
        Duration::from_secs(self.page_ready_secs)
    }

    /// Login redirect timeout.
    pub fn login(&self) -> Duration {
        Duration::from_secs(self.login_secs)
    }

    /// Results settling timeout.
    pub fn results(&self) -> Duration {
        Duration::from_secs(self.results_secs)
    }

    /// Download materialization timeout.
    pub fn download(&self) -> Duration {
        Duration::from_secs(self.download_secs)
    }

    /// Resource capture timeout.
    pub fn capture(&self) -> Duration {
        Duration::from_secs(self.capture_secs)
    }

    /// HTTP request timeout.
    pub fn http(&self) -> Duration {
        Duration::from_secs(self.http_secs)
    }

    /// Poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
