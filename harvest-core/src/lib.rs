// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `ReportHarvest` Core
//!
//! Core types, models, and traits for the `ReportHarvest` workspace.
//!
//! This crate provides the foundational abstractions used across all other
//! `ReportHarvest` crates, including:
//!
//! - Domain models (accounts, report queries, artifacts, tabular datasets)
//! - Portal descriptors (locator chains, endpoints, wait budgets)
//! - Error types
//! - The dataset merge
//! - Trait seams for account processing and dataset sinks
//!
//! ## Key Types
//!
//! ### Inputs
//! - [`AccountCredential`] - One portal account (label, identity, secret)
//! - [`ReportQuery`] - The date range requested from the portal
//!
//! ### Outputs
//! - [`ReportArtifact`] - Raw report bytes plus provenance
//! - [`Dataset`] - Rows of text cells, header first
//! - [`AccountOutcome`] - Per-account terminal state for a run
//!
//! ### Portal Description
//! - [`PortalDescriptor`] - Every URL, locator and endpoint the portal needs
//! - [`LocatorChain`] - Ordered, first-match-wins element locators
//! - [`WaitSettings`] - Bounded wait budgets

pub mod cancel;
pub mod error;
pub mod merge;
pub mod models;
pub mod traits;

// Re-export error types
pub use error::CoreError;

// Re-export all model types
pub use models::{
    // Inputs
    AccountCredential,
    ReportQuery,
    Secret,
    // Outputs
    AccountOutcome,
    AccountStatus,
    Dataset,
    FailureStage,
    ReportArtifact,
    artifact_file_name,
    sanitize_label,
    // Portal description
    ElementLocator,
    LocatorChain,
    LocatorStrategy,
    PortalDescriptor,
    QueryParams,
    roles,
    Selector,
    WaitSettings,
};

pub use cancel::{CancelSource, CancelToken};
pub use merge::{merge_datasets, merge_datasets_with, MergeOptions, DEFAULT_SOURCE_COLUMN};

// Re-export traits
pub use traits::{AccountFailure, AccountProcessor, DatasetSink};
