//! Browser page abstraction.
//!
//! Everything above this module talks to a rendered page through
//! [`PageDriver`], so authentication, navigation and the acquisition
//! strategies can be exercised against a scripted fake in tests. The
//! production implementation is [`ChromiumPage`](super::chromium::ChromiumPage).

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvest_core::{ElementLocator, Selector};
use serde::{Deserialize, Serialize};

use crate::error::BrowserError;

// ============================================================================
// Cookie
// ============================================================================

/// A browser cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain the cookie belongs to.
    pub domain: String,
    /// Path the cookie is valid for.
    pub path: String,
    /// Expiration time. `None` for session cookies.
    pub expires: Option<DateTime<Utc>>,
    /// Whether the cookie requires HTTPS.
    pub secure: bool,
    /// Whether the cookie is HTTP-only.
    pub http_only: bool,
}

impl Cookie {
    /// Creates a session cookie for `domain`.
    pub fn session(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: "/".to_string(),
            expires: None,
            secure: false,
            http_only: false,
        }
    }

    /// Returns true if the cookie is expired.
    pub fn is_expired(&self) -> bool {
        self.expires.is_some_and(|exp| exp < Utc::now())
    }

    /// Returns true if this cookie would be sent to `host`.
    pub fn matches_domain(&self, host: &str) -> bool {
        let cookie_domain = self.domain.trim_start_matches('.');
        host == cookie_domain || host.ends_with(&format!(".{cookie_domain}"))
    }
}

/// Formats cookies as a `Cookie` request header value.
///
/// Expired cookies and cookies for other hosts are left out when `host` is
/// given.
pub fn cookies_to_header(cookies: &[Cookie], host: Option<&str>) -> String {
    cookies
        .iter()
        .filter(|c| !c.is_expired())
        .filter(|c| host.is_none_or(|h| c.matches_domain(h)))
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Page Driver
// ============================================================================

/// One rendered browser page owned by one account.
///
/// Element operations take an [`ElementLocator`]; a locator whose `nth`
/// match does not exist yields [`BrowserError::ElementNotFound`].
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigates to `url` and waits for the load to finish.
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// The address currently shown.
    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Serialized DOM of the current document.
    async fn content(&self) -> Result<String, BrowserError>;

    /// Evaluates a JavaScript expression and returns its JSON value.
    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, BrowserError>;

    /// Number of elements matching `selector`.
    async fn count(&self, selector: &Selector) -> Result<usize, BrowserError>;

    /// Replaces the value of an input and fires `input`/`change` events.
    async fn fill(&self, locator: &ElementLocator, value: &str) -> Result<(), BrowserError>;

    /// Clicks an element.
    async fn click(&self, locator: &ElementLocator) -> Result<(), BrowserError>;

    /// Cookies visible to the current page.
    async fn cookies(&self) -> Result<Vec<Cookie>, BrowserError>;

    /// The user agent the page presents.
    async fn user_agent(&self) -> Result<String, BrowserError>;

    /// Writes a PNG of the page to `path`.
    async fn screenshot(&self, path: &Path) -> Result<(), BrowserError>;

    /// Directory the browser saves downloads into, if downloads are enabled.
    fn download_dir(&self) -> Option<&Path>;

    /// Releases the page and its browser. Safe to call more than once.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// Opens one isolated page per account.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Opens a fresh session for the account labelled `label`.
    async fn open(&self, label: &str) -> Result<Box<dyn PageDriver>, BrowserError>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_is_expired() {
        let mut cookie = Cookie::session("sid", "abc", "portal.example");
        assert!(!cookie.is_expired());

        cookie.expires = Some(Utc::now() - chrono::Duration::hours(1));
        assert!(cookie.is_expired());
    }

    #[test]
    fn test_cookie_domain_matching() {
        let cookie = Cookie::session("sid", "abc", ".portal.example");
        assert!(cookie.matches_domain("portal.example"));
        assert!(cookie.matches_domain("app.portal.example"));
        assert!(!cookie.matches_domain("evilportal.example"));
    }

    #[test]
    fn test_cookies_to_header() {
        let mut stale = Cookie::session("old", "1", "portal.example");
        stale.expires = Some(Utc::now() - chrono::Duration::minutes(5));
        let cookies = vec![
            Cookie::session("XSRF-TOKEN", "t0k", "portal.example"),
            Cookie::session("laravel_session", "s3ss", "portal.example"),
            Cookie::session("other", "x", "elsewhere.example"),
            stale,
        ];

        assert_eq!(
            cookies_to_header(&cookies, Some("portal.example")),
            "XSRF-TOKEN=t0k; laravel_session=s3ss"
        );
        assert_eq!(
            cookies_to_header(&cookies, None),
            "XSRF-TOKEN=t0k; laravel_session=s3ss; other=x"
        );
    }
}
