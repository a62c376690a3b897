//! Domain models for `ReportHarvest`.
//!
//! ## Submodules
//!
//! - [`account`] - Account credentials and secrets
//! - [`query`] - Report date-range queries
//! - [`artifact`] - Raw report artifacts and their file naming
//! - [`dataset`] - Tabular datasets (rows of text cells)
//! - [`locator`] - Element locators and ordered locator chains
//! - [`portal`] - The full description of a remote portal
//! - [`outcome`] - Per-account run outcomes

mod account;
mod artifact;
mod dataset;
mod locator;
mod outcome;
mod portal;
mod query;

// Re-export everything at the models level
pub use account::{AccountCredential, Secret};
pub use artifact::{artifact_file_name, sanitize_label, ReportArtifact};
pub use dataset::Dataset;
pub use locator::{ElementLocator, LocatorChain, LocatorStrategy, Selector};
pub use outcome::{AccountOutcome, AccountStatus, FailureStage};
pub use portal::{roles, PortalDescriptor, QueryParams, WaitSettings};
pub use query::ReportQuery;
