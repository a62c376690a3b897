//! Fetch error types.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for per-account fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Credentials were submitted but the session stayed on the login surface.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Navigation bounced back to the login surface.
    #[error("Session expired: redirected to {url}")]
    SessionExpired {
        /// Where the browser ended up.
        url: String,
    },

    /// A required control could not be located or the view never settled.
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Every acquisition strategy failed or was skipped.
    #[error("All {} acquisition strategies failed: {}", reasons.len(), join_reasons(reasons))]
    AcquisitionExhausted {
        /// One entry per strategy, in strategy order.
        reasons: Vec<AttemptReason>,
    },

    /// No strategies were configured.
    #[error("No acquisition strategies configured")]
    NoStrategies,

    /// Browser error.
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// A bounded wait ran out.
    #[error("Wait error: {0}")]
    Wait(#[from] WaitError),

    /// A locator chain had no complete match.
    #[error("Locator error: {0}")]
    Locator(#[from] LocatorError),

    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] harvest_core::CoreError),

    /// The run was cancelled.
    #[error("Cancelled")]
    Cancelled,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_reasons(reasons: &[AttemptReason]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Why one strategy did not produce the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptReason {
    /// Strategy identifier.
    pub strategy_id: String,
    /// Failure or precondition description.
    pub reason: String,
    /// True if the strategy was skipped rather than failed.
    pub skipped: bool,
}

impl fmt::Display for AttemptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.skipped { "skipped" } else { "failed" };
        write!(f, "{} {verb}: {}", self.strategy_id, self.reason)
    }
}

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Domain not allowed.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Client could not be constructed.
    #[error("Client setup failed: {0}")]
    Setup(String),
}

// ============================================================================
// Browser Error
// ============================================================================

/// Error type for browser session operations.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// No usable Chromium executable.
    #[error("Browser not found: {0}")]
    NotFound(String),

    /// The browser process could not be started.
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// A DevTools protocol call failed.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A page script threw or returned an unexpected value.
    #[error("Script error: {0}")]
    Script(String),

    /// An element operation targeted something that is not on the page.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// A browser operation exceeded its time budget.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// What was being done.
        operation: String,
        /// The budget that ran out.
        after: Duration,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BrowserError {
    /// Wraps any displayable protocol error.
    pub fn protocol(err: impl fmt::Display) -> Self {
        Self::Protocol(err.to_string())
    }
}

// ============================================================================
// Wait Error
// ============================================================================

/// Error type for bounded waits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The predicate never held within the budget.
    #[error("Timed out after {after:?} waiting for {what}")]
    TimedOut {
        /// What was awaited.
        what: String,
        /// The budget that ran out.
        after: Duration,
    },
}

// ============================================================================
// Locator Error
// ============================================================================

/// Error type for locator chain evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    /// No strategy located every required role.
    #[error("No locator strategy matched {roles:?} (tried: {})", tried.join(", "))]
    NoMatch {
        /// Roles that had to be located.
        roles: Vec<String>,
        /// Strategy names, in the order they were tried.
        tried: Vec<String>,
    },
}

// ============================================================================
// Tests
// ============================================================================
