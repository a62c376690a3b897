// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `ReportHarvest` Store
//!
//! Everything that happens around the browser work.
//!
//! This crate provides:
//!
//! - **Config**: the JSON run configuration and secret resolution
//! - **Tabular**: parsing report artifacts (workbooks or CSV) into text grids
//! - **Merger**: merging parsed artifacts, and re-merging artifacts on disk
//! - **Sinks**: the merged CSV file and the spreadsheet REST sink
//! - **Orchestrator**: runs every account, isolates failures, merges, publishes
//! - **Persistence**: JSON file helpers and default paths
//!
//! ## Usage
//!
//! ```ignore
//! use harvest_store::{HarvestConfig, Orchestrator};
//!
//! let config = HarvestConfig::load_from(&path)?;
//! let accounts = config.resolve_accounts()?;
//! let orchestrator = Orchestrator::new(processor, config.concurrency).with_sink(sink);
//! let report = orchestrator.run(&accounts, &query, &cancel).await;
//! std::process::exit(report.exit_code().into());
//! ```

pub mod config;
pub mod error;
pub mod merger;
pub mod orchestrator;
pub mod persistence;
pub mod sink;
pub mod tabular;

pub use config::{
    AccountConfig, AcquisitionConfig, BrowserConfig, HarvestConfig, ReportConfig, SecretSource,
    SinksConfig, SpreadsheetSinkConfig, WaitsConfig,
};
pub use error::StoreError;
pub use merger::{discover_artifacts, load_artifacts, merge_artifacts, MergeSummary};
pub use orchestrator::{publish_merged, Orchestrator, PublishReport, RunReport};
pub use persistence::{default_config_dir, default_config_path, save_json};
pub use sink::{CsvFileSink, SheetsSink};
pub use tabular::{parse_artifact, ArtifactFormat};
