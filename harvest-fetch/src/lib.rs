// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `ReportHarvest` Fetch
//!
//! Acquisition infrastructure for the `ReportHarvest` workspace.
//!
//! ## Host APIs
//!
//! The [`host`] module provides abstractions for system interactions:
//!
//! - [`host::browser`] - The [`PageDriver`] browser-page abstraction and cookies
//! - [`host::chromium`] - Headless Chromium sessions via `chromiumoxide`
//! - [`host::http`] - HTTP client with tracing, session replay, and a domain allowlist
//! - [`host::files`] - Download-directory scanning and atomic artifact writes
//!
//! ## Acquisition Pipeline
//!
//! The acquisition pipeline runs strategies strictly in order until one
//! succeeds:
//!
//! - [`strategy::AcquisitionStrategy`] - Trait for acquisition implementations
//! - [`pipeline::AcquisitionPipeline`] - Executes strategies in order
//! - [`context::AcquireContext`] - What a strategy may touch for one account
//!
//! ## Waiting and Locating
//!
//! - [`clock::Clock`] - Injectable time source
//! - [`wait`] - Bounded polls against readiness predicates
//! - [`locator`] - First-match-wins evaluation of locator chains
//!
//! ## Example
//!
//! ```ignore
//! use harvest_fetch::{AcquireContext, AcquisitionPipeline};
//!
//! let pipeline = AcquisitionPipeline::with_strategies(vec![
//!     Box::new(DownloadWatchStrategy::new(portal.clone())),
//!     Box::new(ReplayStrategy::new(portal.clone())),
//! ]);
//!
//! let outcome = pipeline.execute(&ctx).await;
//! ```

// Core modules
pub mod clock;
pub mod context;
pub mod error;
pub mod host;
pub mod locator;
pub mod pipeline;
pub mod strategy;
pub mod wait;

#[cfg(test)]
mod testing;

// Re-export key types at crate root

// Errors
pub use error::{AttemptReason, BrowserError, FetchError, HttpError, LocatorError, WaitError};

// Host APIs
pub use host::{
    browser::{Cookie, PageDriver, SessionFactory},
    chromium::{ChromiumLauncher, ChromiumPage, LaunchOptions},
    http::{HttpClient, HttpPayload, SessionCredentials},
};

// Strategy & Pipeline
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{AcquireContext, AcquireSettings};
pub use locator::{resolve_chain, ResolvedTargets};
pub use pipeline::{AcquisitionAttempt, AcquisitionOutcome, AcquisitionPipeline, AttemptOutcome};
pub use strategy::{AcquisitionKind, AcquisitionStrategy, StrategyOutcome};
pub use wait::{wait_for, wait_settled, WaitSpec};
