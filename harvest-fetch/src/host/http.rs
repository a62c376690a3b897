//! HTTP client with tracing, session replay, and a domain allowlist.
//!
//! This module provides a wrapped HTTP client that adds:
//! - Request/response tracing
//! - Domain allowlist so captured session cookies only go to the portal
//! - Replay of a browser session's cookies, user agent and referer
//! - Buffered payloads with the few response facts strategies judge

use reqwest::{header, Client, RequestBuilder};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use super::browser::{cookies_to_header, Cookie};
use crate::error::HttpError;

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Fallback user agent when the browser's could not be read.
const USER_AGENT: &str = concat!("ReportHarvest/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Session Credentials
// ============================================================================

/// What a plain HTTP request needs to pass as the browser session.
#[derive(Clone, Default)]
pub struct SessionCredentials {
    /// `Cookie` header value.
    pub cookie_header: String,
    /// `User-Agent` header value.
    pub user_agent: Option<String>,
    /// `Referer` header value, normally the report view.
    pub referer: Option<String>,
}

impl SessionCredentials {
    /// Builds credentials from browser cookies, keeping only those that
    /// would be sent to `target_host`.
    pub fn from_cookies(
        cookies: &[Cookie],
        target_host: Option<&str>,
        user_agent: Option<String>,
        referer: Option<String>,
    ) -> Self {
        Self {
            cookie_header: cookies_to_header(cookies, target_host),
            user_agent,
            referer,
        }
    }

    fn apply(&self, mut request: RequestBuilder) -> RequestBuilder {
        if !self.cookie_header.is_empty() {
            request = request.header(header::COOKIE, &self.cookie_header);
        }
        if let Some(ref ua) = self.user_agent {
            request = request.header(header::USER_AGENT, ua);
        }
        if let Some(ref referer) = self.referer {
            request = request.header(header::REFERER, referer);
        }
        request
    }
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("cookie_header", &"***")
            .field("user_agent", &self.user_agent)
            .field("referer", &self.referer)
            .finish()
    }
}

// ============================================================================
// Payload
// ============================================================================

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpPayload {
    /// Status code.
    pub status: u16,
    /// Declared `Content-Type`, lowercased.
    pub content_type: Option<String>,
    /// Body bytes.
    pub bytes: Vec<u8>,
}

impl HttpPayload {
    /// Returns true for status 200.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Returns true if the declared content type names a spreadsheet or
    /// binary download.
    pub fn is_spreadsheet(&self) -> bool {
        self.content_type.as_deref().is_some_and(|ct| {
            ["spreadsheet", "excel", "octet-stream", "csv"]
                .iter()
                .any(|needle| ct.contains(needle))
        })
    }
}

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client wrapper with tracing and a domain allowlist.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    allowed_domains: Option<Vec<String>>,
}

impl HttpClient {
    /// Creates a new HTTP client with default settings.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new HTTP client with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let inner = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HttpError::Setup(e.to_string()))?;

        Ok(Self {
            inner,
            allowed_domains: None,
        })
    }

    /// Restricts requests to `domains` and their subdomains.
    pub fn allow_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = Some(domains);
        self
    }

    /// Checks if a URL's domain is allowed.
    fn is_domain_allowed(&self, url: &str) -> Result<(), HttpError> {
        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl(format!("{url}: {e}")))?;

        let Some(ref allowed) = self.allowed_domains else {
            return Ok(()); // No restrictions
        };

        let host = parsed
            .host_str()
            .ok_or_else(|| HttpError::InvalidUrl("No host in URL".to_string()))?;

        let allowed = allowed
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{domain}")));

        if allowed {
            Ok(())
        } else {
            Err(HttpError::DomainNotAllowed(host.to_string()))
        }
    }

    /// Performs a GET with query parameters as the browser session.
    #[instrument(skip(self, query, session), fields(url = %url))]
    pub async fn get_as_session(
        &self,
        url: &str,
        query: &[(String, String)],
        session: &SessionCredentials,
    ) -> Result<HttpPayload, HttpError> {
        self.is_domain_allowed(url)?;
        debug!(params = query.len(), "GET request as session");

        let request = session.apply(self.inner.get(url).query(query));
        self.send(request).await
    }

    /// Performs a form POST as the browser session.
    #[instrument(skip(self, form, session), fields(url = %url))]
    pub async fn post_form_as_session(
        &self,
        url: &str,
        form: &[(String, String)],
        session: &SessionCredentials,
    ) -> Result<HttpPayload, HttpError> {
        self.is_domain_allowed(url)?;
        debug!(fields = form.len(), "POST form as session");

        let request = session.apply(self.inner.post(url).form(form));
        self.send(request).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<HttpPayload, HttpError> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_lowercase);
        let bytes = response.bytes().await?.to_vec();

        debug!(status, content_type = ?content_type, bytes = bytes.len(), "Response received");
        Ok(HttpPayload {
            status,
            content_type,
            bytes,
        })
    }

    /// Returns the inner reqwest client for advanced operations.
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

// ============================================================================
// Tests
// ============================================================================
