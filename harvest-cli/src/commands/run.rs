//! Run command - process every account, merge, publish.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use harvest_core::CancelSource;
use harvest_fetch::{AcquireSettings, ChromiumLauncher, LaunchOptions};
use harvest_portal::{Diagnostics, PortalProcessor, ProcessorOptions, DEFAULT_STRATEGY_ORDER};
use harvest_store::{save_json, HarvestConfig, Orchestrator};
use tracing::{debug, info, warn};

use super::{apply_overrides, build_sinks, load_config, report_query};
use crate::output::format_run_summary;
use crate::Cli;

/// Arguments for the run command.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Report date (YYYY-MM-DD). Defaults to the configured day.
    #[arg(long, short)]
    pub date: Option<NaiveDate>,

    /// Output directory override.
    #[arg(long, short)]
    pub output_dir: Option<PathBuf>,

    /// Accounts processed at once.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Only use these strategies, in this order (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub strategies: Option<Vec<String>>,

    /// Skip the spreadsheet sink; the merged CSV is still written.
    #[arg(long)]
    pub no_sinks: bool,
}

/// Runs the run command.
pub async fn run(args: &RunArgs, cli: &Cli) -> Result<ExitCode> {
    let mut config = load_config(cli)?;
    apply_overrides(&mut config, args.output_dir.as_ref());
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency.max(1);
    }
    if let Some(ref strategies) = args.strategies {
        config.acquisition.strategies = Some(strategies.clone());
    }

    let accounts = config.resolve_accounts()?;
    let query = report_query(&config, args.date);
    info!(
        accounts = accounts.len(),
        date = %query.partition_key(),
        output_dir = %config.output_dir.display(),
        "Starting harvest"
    );

    let processor = build_processor(&config)?;
    let orchestrator = Orchestrator::new(processor, config.concurrency)
        .with_sinks(build_sinks(&config, !args.no_sinks)?);
    debug!(sinks = ?orchestrator.sink_names(), "Sinks ready");

    let source = Arc::new(CancelSource::new());
    let token = source.token();
    let deadline = config.waits.run_deadline().map(|d| source.cancel_after(d));
    let interrupt = {
        let source = Arc::clone(&source);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling in-flight accounts");
                source.cancel();
            }
        })
    };

    let report = orchestrator.run(&accounts, &query, &token).await;

    interrupt.abort();
    if let Some(handle) = deadline {
        handle.abort();
    }

    let summary_path = config
        .output_dir
        .join(format!("run_summary_{}.json", report.partition_key));
    if let Err(e) = save_json(&summary_path, &report).await {
        warn!(path = %summary_path.display(), error = %e, "Could not save run summary");
    }

    if !cli.quiet {
        println!("{}", format_run_summary(&report));
    }
    Ok(ExitCode::from(report.exit_code()))
}

/// Builds the browser-backed account processor from configuration.
fn build_processor(config: &HarvestConfig) -> Result<PortalProcessor<ChromiumLauncher>> {
    let launch = LaunchOptions {
        executable: config.browser.executable.clone(),
        headless: config.browser.headless,
        window: (config.browser.window_width, config.browser.window_height),
        user_agent: config.browser.user_agent.clone(),
        ..LaunchOptions::default()
    };

    let waits = config.waits.budgets.clone();
    let options = ProcessorOptions {
        output_dir: config.output_dir.clone(),
        artifact_prefix: config.artifact_prefix.clone(),
        acquire: AcquireSettings::from_waits(
            &waits,
            config.acquisition.min_payload_bytes,
            &config.artifact_extension,
        ),
        strategies: config.acquisition.strategies.clone().unwrap_or_else(|| {
            DEFAULT_STRATEGY_ORDER
                .iter()
                .map(|s| (*s).to_string())
                .collect()
        }),
        diagnostics: config
            .diagnostics_dir
            .as_ref()
            .map_or_else(Diagnostics::disabled, |dir| Diagnostics::new(dir.clone())),
        waits,
    };

    PortalProcessor::new(ChromiumLauncher::new(launch), config.portal.clone(), options)
        .context("invalid portal configuration")
}
