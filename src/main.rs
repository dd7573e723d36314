//! CLI entry point for newsbinder.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use newsbinder_core::{
    ArchiveSettings, Credentials, FetchStats, Fetcher, GeniosArchive, IssueBinder, RunContext,
    WatermarkStripper, bind_directory,
};
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let loaded = app_config::load_config(args.config.as_deref())?;
    if loaded.loaded_from_file {
        debug!(path = ?loaded.path, "Loaded config file");
    }
    let mut config = loaded.config;
    app_config::apply_cli_overrides(&mut config, &args)?;

    if let Some(dir) = &args.from_dir {
        let stripper = WatermarkStripper::from_config(&config.watermark);
        let report = bind_directory(dir, &stripper)
            .with_context(|| format!("Failed to bind page files in '{}'", dir.display()))?;
        info!(
            pages = report.pages.len(),
            path = %report.output_path.display(),
            "Pages bound"
        );
        return Ok(());
    }

    app_config::apply_env_credentials(&mut config);

    let date = args.date.unwrap_or_else(|| Local::now().date_naive());
    info!(
        %date,
        edition = %config.editions.desired,
        default_edition = %config.editions.default,
        "Newsbinder starting"
    );

    let stats = Arc::new(FetchStats::new());
    let fetcher = Fetcher::new(
        config.fetch.timeouts(),
        config.fetch.retry_policy(),
        Arc::clone(&stats),
    )?;
    let archive = GeniosArchive::new(fetcher, ArchiveSettings::from_config(&config));

    if let Some(credentials) = Credentials::from_config(&config.credentials) {
        archive
            .login(&credentials)
            .await
            .context("Archive login failed")?;
    } else {
        warn!("No credentials configured, continuing without login");
    }

    let binder = IssueBinder::from_config(&config, RunContext::new(date, stats))?;
    let report = binder.run_with_retry(&archive).await?;

    for excluded in &report.excluded {
        warn!(page = excluded.page, reason = %excluded.reason, "Page missing from output");
    }
    info!(
        assembled = report.assembled.len(),
        expected = report.expected,
        skipped_rows = report.skipped_rows,
        fetches = report.fetches,
        retries = report.retries,
        path = %report.output_path.display(),
        "Issue complete"
    );

    Ok(())
}
