//! Check-config command - validate configuration without browsing.

use std::process::ExitCode;

use anyhow::Result;
use harvest_portal::{build_pipeline, DEFAULT_STRATEGY_ORDER};
use harvest_store::SecretSource;

use super::load_config;
use crate::Cli;

/// Runs the check-config command.
///
/// Fails if the strategy order is invalid or an account secret is missing
/// from the environment.
pub fn run(cli: &Cli) -> Result<ExitCode> {
    let config = load_config(cli)?;
    let mut problems = 0usize;

    println!("Configuration: {}", cli.config_path().display());
    println!("Login page:    {}", config.portal.login_url);
    println!("Report page:   {}", config.portal.report_url);
    println!("Output:        {}", config.output_dir.display());

    let strategies = config.acquisition.strategies.clone().unwrap_or_else(|| {
        DEFAULT_STRATEGY_ORDER
            .iter()
            .map(|s| (*s).to_string())
            .collect()
    });
    match build_pipeline(&config.portal, &strategies) {
        Ok(pipeline) => println!("Strategies:    {}", pipeline.strategy_ids().join(" -> ")),
        Err(e) => {
            println!("Strategies:    invalid ({e})");
            problems += 1;
        }
    }

    println!("Accounts:");
    for account in &config.accounts {
        let secret = match &account.secret {
            SecretSource::Inline(_) => "inline".to_string(),
            SecretSource::Env { env } if std::env::var_os(env).is_some() => format!("${env}"),
            SecretSource::Env { env } => {
                problems += 1;
                format!("${env} (not set)")
            }
        };
        println!("  {:<20} {:<30} {secret}", account.label, account.identity);
    }

    match &config.sinks.spreadsheet {
        Some(sheet) if std::env::var_os(&sheet.access_token_env).is_none() => {
            println!(
                "Spreadsheet:   {} (token ${} not set)",
                sheet.spreadsheet_id, sheet.access_token_env
            );
            problems += 1;
        }
        Some(sheet) => println!("Spreadsheet:   {}", sheet.spreadsheet_id),
        None => println!("Spreadsheet:   not configured"),
    }

    if problems == 0 {
        println!("\nConfiguration OK");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("\n{problems} problem(s) found");
        Ok(ExitCode::FAILURE)
    }
}
