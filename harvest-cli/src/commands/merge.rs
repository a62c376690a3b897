//! Merge command - rebuild the merged dataset from artifacts on disk.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use harvest_core::MergeOptions;
use harvest_store::{discover_artifacts, load_artifacts, publish_merged};
use tracing::info;

use super::{apply_overrides, build_sinks, load_config, report_query};
use crate::output::format_publish_summary;
use crate::Cli;

/// Arguments for the merge command.
#[derive(Args, Debug, Default)]
pub struct MergeArgs {
    /// Partition date (YYYY-MM-DD). Defaults to the configured day.
    #[arg(long, short)]
    pub date: Option<NaiveDate>,

    /// Directory holding the per-account artifacts.
    #[arg(long, short)]
    pub output_dir: Option<PathBuf>,

    /// Skip the spreadsheet sink; the merged CSV is still written.
    #[arg(long)]
    pub no_sinks: bool,
}

/// Runs the merge command.
pub async fn run(args: &MergeArgs, cli: &Cli) -> Result<ExitCode> {
    let mut config = load_config(cli)?;
    apply_overrides(&mut config, args.output_dir.as_ref());
    let partition_key = report_query(&config, args.date).partition_key();

    let found = discover_artifacts(
        &config.output_dir,
        &config.artifact_prefix,
        &config.merged_prefix,
        &config.artifact_extension,
        &config.account_labels(),
    )
    .with_context(|| format!("cannot list {}", config.output_dir.display()))?;
    info!(artifacts = found.len(), partition = %partition_key, "Re-merging artifacts");

    let artifacts = load_artifacts(&found).await?;
    let sinks = build_sinks(&config, !args.no_sinks)?;
    let report = publish_merged(&artifacts, &partition_key, &MergeOptions::default(), &sinks).await;

    if !cli.quiet {
        println!("{}", format_publish_summary(&partition_key, &report));
    }
    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
