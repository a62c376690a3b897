// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! `ReportHarvest` CLI - daily report extraction across portal accounts.
//!
//! # Examples
//!
//! ```bash
//! # Harvest yesterday's report for every configured account
//! harvest run
//!
//! # A specific day, three accounts at a time
//! harvest run --date 2025-06-30 --concurrency 3
//!
//! # Re-merge artifacts already on disk and publish again
//! harvest merge --date 2025-06-30
//!
//! # Validate the configuration and secrets without browsing
//! harvest check-config
//! ```

mod commands;
mod output;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{check, merge, run};

// ============================================================================
// CLI Definition
// ============================================================================

/// `ReportHarvest` CLI - multi-account daily report extraction.
#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Harvest a daily report from every configured portal account")]
#[command(long_about = r#"
ReportHarvest logs into a browser-only portal once per account, requests
the daily report, merges every account's report into one table, and
publishes it.

Examples:
  harvest run                          # Yesterday, every account
  harvest run --date 2025-06-30        # A specific day
  harvest merge                        # Re-merge artifacts on disk
  harvest check-config                 # Validate configuration
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file.
    #[arg(long, short, global = true, env = "HARVEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Quiet mode (no logs, no summary).
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Also write logs to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// The configuration file in effect.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(harvest_store::default_config_path)
    }
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Process every account, merge, and publish.
    #[command(visible_alias = "r")]
    Run(run::RunArgs),

    /// Merge artifacts already in the output directory and publish.
    #[command(visible_alias = "m")]
    Merge(merge::MergeArgs),

    /// Validate the configuration and report missing secrets.
    CheckConfig,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    if quiet {
        return Ok(());
    }

    let default = if verbose {
        "harvest=debug,info"
    } else {
        "harvest=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .with(filter)
        .init();
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    let result = match &cli.command {
        Commands::Run(args) => run::run(args, &cli).await,
        Commands::Merge(args) => merge::run(args, &cli).await,
        Commands::CheckConfig => check::run(&cli),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}
