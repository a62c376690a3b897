//! Host APIs for acquisition strategies.
//!
//! This module provides abstractions for interacting with external systems:
//!
//! - [`browser`] - Page driver trait, session factory, and cookies
//! - [`chromium`] - Chromium implementation of the page driver
//! - [`http`] - HTTP client with tracing and domain allowlist
//! - [`files`] - Download detection and atomic artifact writes

pub mod browser;
pub mod chromium;
pub mod files;
pub mod http;

// Re-export key types
pub use browser::{cookies_to_header, Cookie, PageDriver, SessionFactory};
pub use chromium::{ChromiumLauncher, ChromiumPage, LaunchOptions};
pub use files::DirSnapshot;
pub use http::{HttpClient, HttpPayload, SessionCredentials};
