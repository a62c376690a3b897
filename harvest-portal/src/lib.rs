// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `ReportHarvest` Portal
//!
//! The binding between `ReportHarvest` and the remote reporting portal.
//!
//! ## Per-account Flow
//!
//! 1. **Authenticator** ([`auth`]): fills the login form located through an
//!    ordered locator chain, submits, and confirms the session left the
//!    login surface.
//! 2. **Navigator** ([`navigator`]): opens the report view, fills the date
//!    range, submits, and waits for the results to settle.
//! 3. **Acquisition** ([`strategies`]): the pipeline built by
//!    [`descriptor::build_pipeline`] obtains the report bytes through, in
//!    default order:
//!    - `download_watch`: click the download control and watch the download
//!      directory
//!    - `resource_capture`: hook in-page blob creation and read the bytes
//!    - `authenticated_replay`: replay the discovered download request with
//!      the session's cookies
//!    - `direct_request`: try known export endpoints next to the report view
//!
//! [`PortalProcessor`] wires these together per account, owns the browser
//! session, and releases it on every exit path.
//!
//! ## Usage
//!
//! ```ignore
//! use harvest_portal::{PortalProcessor, ProcessorOptions};
//!
//! let processor = PortalProcessor::new(launcher, portal, options)?;
//! let artifact = processor.process(&account, &query, &cancel).await?;
//! ```

pub mod auth;
pub mod descriptor;
pub mod diagnostics;
pub mod discovery;
pub mod error;
pub mod navigator;
pub mod processor;
pub mod strategies;
mod web;

// Re-exports
pub use auth::{AuthenticatedSession, Authenticator};
pub use descriptor::{build_pipeline, strategy_ids, DEFAULT_STRATEGY_ORDER};
pub use diagnostics::Diagnostics;
pub use discovery::{discover_csrf_token, discover_download_target, DownloadTarget};
pub use error::PortalError;
pub use navigator::{Navigator, ReportView};
pub use processor::{PortalProcessor, ProcessorOptions, DEFAULT_ARTIFACT_PREFIX};
pub use strategies::{
    AuthenticatedReplayStrategy, DirectRequestStrategy, DownloadWatchStrategy,
    ResourceCaptureStrategy,
};
