#![forbid(unsafe_code)]

//! Metrica CLI
//!
//! Refreshes the monthly KPI dataset from the ledger, CRM and membership
//! sources.

use anyhow::{Context, Result};
use clap::Parser;
use metrica_cli::config::{self, AppConfig, CONFIG_ENV_VAR, Overrides};
use metrica_cli::output;
use metrica_core::{RefreshPlanner, month_windows_from_now};
use metrica_pipeline::{RunOrchestrator, Sources};
use metrica_sources::{CrmClient, Credentials, LedgerClient, membership_source};
use std::path::PathBuf;
use std::sync::Arc;

/// Metrica - monthly KPI refresh
#[derive(Parser, Debug)]
#[command(name = "metrica", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Dataset file to read and write (overrides `run.output_path`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of completed months to include (overrides `run.months_back`)
    #[arg(long)]
    months: Option<u32>,

    /// Recompute every month, ignoring the existing dataset
    #[arg(long)]
    full_refresh: bool,

    /// Build the dataset without writing it
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging for Metrica crates
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_filter = if args.verbose {
        "info,metrica=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let config_path = config::resolve_config_path(args.config);
    let app = AppConfig::load(&config_path)
        .and_then(|c| {
            c.with_overrides(Overrides {
                output_path: args.output,
                months_back: args.months,
            })
        })
        .with_context(|| format!("invalid configuration in {}", config_path.display()))?;

    let credentials = match Credentials::from_env(app.membership.requires_token()) {
        Ok(credentials) => credentials,
        Err(e) => {
            tracing::error!(error = %e, "Cannot start without credentials");
            return Err(e.into());
        }
    };

    let kpi = Arc::new(app.kpi);
    let sources = Sources {
        ledger: Arc::new(LedgerClient::new(app.ledger, &credentials, kpi.clone())?),
        crm: Arc::new(CrmClient::new(app.crm, &credentials, kpi.clone())?),
        membership: membership_source(app.membership, &credentials, kpi.clone())?,
    };
    let planner = RefreshPlanner::new(app.run.always_refresh).with_full_refresh(args.full_refresh);
    let orchestrator = RunOrchestrator::new(kpi, sources, planner);

    let windows = month_windows_from_now(app.run.months_back);
    tracing::info!(
        months = windows.len(),
        output = %app.run.output_path.display(),
        full_refresh = args.full_refresh,
        dry_run = args.dry_run,
        "Metrica refresh starting"
    );

    let report = orchestrator
        .run_to_path(&app.run.output_path, &windows, args.dry_run)
        .await
        .with_context(|| format!("failed to write {}", app.run.output_path.display()))?;

    for line in output::month_lines(&report) {
        println!("{line}");
    }
    println!("{}", output::summary_line(&report));

    Ok(())
}
