//! CLI command implementations.

pub mod check;
pub mod merge;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use harvest_core::{DatasetSink, ReportQuery};
use harvest_store::{CsvFileSink, HarvestConfig, SheetsSink};
use tracing::info;

use crate::Cli;

/// Loads the configuration named on the command line.
pub fn load_config(cli: &Cli) -> Result<HarvestConfig> {
    let path = cli.config_path();
    HarvestConfig::load_from(&path)
        .with_context(|| format!("cannot load configuration from {}", path.display()))
}

/// Applies the flags shared by `run` and `merge`.
pub fn apply_overrides(config: &mut HarvestConfig, output_dir: Option<&PathBuf>) {
    if let Some(dir) = output_dir {
        config.output_dir.clone_from(dir);
    }
}

/// The query for this run: `--date` if given, otherwise the configured day.
pub fn report_query(config: &HarvestConfig, date: Option<NaiveDate>) -> ReportQuery {
    match date {
        Some(day) => ReportQuery::single_day(day),
        None => config.report.query(Local::now().date_naive()),
    }
}

/// The merged-CSV sink, plus the spreadsheet sink unless disabled.
pub fn build_sinks(config: &HarvestConfig, with_remote: bool) -> Result<Vec<Box<dyn DatasetSink>>> {
    let mut sinks: Vec<Box<dyn DatasetSink>> = vec![Box::new(CsvFileSink::new(
        config.csv_dir(),
        config.merged_prefix.clone(),
    ))];

    match (&config.sinks.spreadsheet, with_remote) {
        (Some(sheet), true) => {
            let sink = SheetsSink::from_env(sheet).context("cannot set up the spreadsheet sink")?;
            sinks.push(Box::new(sink));
        }
        (Some(_), false) => info!("Spreadsheet sink disabled for this run"),
        (None, _) => {}
    }
    Ok(sinks)
}
