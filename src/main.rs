//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest JSON harvester.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use sumi_harvest::config::{load_config_with_hash, validate, Config};
use sumi_harvest::harvest::{plan_locale, run_all, LocaleOutcome};
use sumi_harvest::identity::IdentityExtractor;
use sumi_harvest::output::{load_statistics, print_statistics};
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: a resilient JSON resource harvester
///
/// Reads one URL list per locale, fetches each resource with retries and
/// backoff, and appends new records to a per-locale dump. Re-running resumes
/// where the previous run stopped.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resilient JSON resource harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Only process these locales (repeatable)
    #[arg(short, long = "locale", value_name = "LOCALE")]
    locales: Vec<String>,

    /// Override the number of concurrent workers
    #[arg(long)]
    concurrency: Option<usize>,

    /// Override the number of retries per URL
    #[arg(long)]
    retries: Option<u32>,

    /// Skip the first N URLs of each list
    #[arg(long)]
    start: Option<usize>,

    /// Fetch at most N URLs per list (0 = all)
    #[arg(long)]
    limit: Option<usize>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show what would be fetched without fetching anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics for existing dumps and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    apply_overrides(&mut config, &cli)?;

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_harvest(&config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Applies command-line overrides and re-validates the result
fn apply_overrides(config: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    if !cli.locales.is_empty() {
        config.locales = cli.locales.clone();
    }
    if let Some(concurrency) = cli.concurrency {
        config.harvest.concurrency = concurrency;
    }
    if let Some(retries) = cli.retries {
        config.harvest.retries = retries;
    }
    if let Some(start) = cli.start {
        config.harvest.start = start;
    }
    if let Some(limit) = cli.limit {
        config.harvest.limit = limit;
    }

    validate(config).context("invalid command-line override")?;
    Ok(())
}

/// Handles the --dry-run mode: shows the plan for each locale
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Sumi-Harvest Dry Run ===\n");

    println!("Harvest Configuration:");
    println!("  Concurrency: {}", config.harvest.concurrency);
    println!("  Retries: {}", config.harvest.retries);
    println!("  Timeout: {}ms", config.harvest.timeout_ms);
    println!("  Start: {}", config.harvest.start);
    match config.harvest.limit() {
        Some(limit) => println!("  Limit: {}", limit),
        None => println!("  Limit: none"),
    }
    println!("  Output mode: {:?}", config.output.mode);
    println!();

    for locale in &config.locales {
        match plan_locale(config, locale)? {
            None => println!(
                "Locale {}: missing {}",
                locale,
                config.output.url_list_path(locale).display()
            ),
            Some((index, plan)) => {
                println!(
                    "Locale {}: {} to fetch, {} already present ({} known), {} repeated, {} without identity",
                    locale,
                    plan.items.len(),
                    plan.already_present,
                    index.len(),
                    plan.repeated,
                    plan.unidentified
                );
            }
        }
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows statistics for each locale's dump
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let extractor = IdentityExtractor::new(config.harvest.identity_param.clone());

    println!("=== Dump Statistics ===\n");
    for locale in &config.locales {
        let path = config.output.dump_path(locale);
        let stats = load_statistics(&path, config.output.mode, &extractor)
            .with_context(|| format!("failed to read {}", path.display()))?;
        print_statistics(locale, &path, &stats);
    }

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: &Config) -> anyhow::Result<()> {
    tracing::info!(
        "Locales: {}, concurrency: {}, retries: {}",
        config.locales.join(","),
        config.harvest.concurrency,
        config.harvest.retries
    );

    let reports = match run_all(config).await {
        Ok(reports) => reports,
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            return Err(e.into());
        }
    };

    let mut appended = 0;
    let mut failed = 0;
    for report in &reports {
        if let LocaleOutcome::Completed(summary) = &report.outcome {
            appended += summary.totals.succeeded;
            failed += summary.totals.failed;
        }
    }
    tracing::info!(
        "Harvest completed: {} locales, {} records appended, {} failed",
        reports.len(),
        appended,
        failed
    );

    Ok(())
}
