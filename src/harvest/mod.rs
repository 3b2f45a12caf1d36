//! Harvest module for fetching and persisting JSON resources
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with timeout, classification, and retry
//! - The shared work queue and progress counters
//! - Worker pool coordination
//! - The per-locale driver tying inputs, dedup index, and sinks together

mod coordinator;
mod fetcher;
mod progress;
mod queue;

pub use coordinator::{plan_work, Coordinator, Plan};
pub use fetcher::{build_http_client, jitter_delay, ErrorKind, FetchResult, Fetcher, RetryPolicy};
pub use progress::{ProgressCounters, ProgressSnapshot, RunSummary};
pub use queue::{WorkItem, WorkQueue};

use crate::config::Config;
use crate::dedup::DedupIndex;
use crate::identity::IdentityExtractor;
use crate::output::open_sink;
use crate::HarvestError;
use std::path::Path;
use std::sync::Arc;

/// What happened to one locale
#[derive(Debug, Clone)]
pub enum LocaleOutcome {
    /// The URL list does not exist
    MissingInput,
    /// Every URL was already harvested or carried no identity
    NothingToDo,
    /// The worker pool ran
    Completed(RunSummary),
}

/// Per-locale result of a harvest
#[derive(Debug, Clone)]
pub struct LocaleReport {
    pub locale: String,
    /// Identities present in the destination before the run
    pub seeded: usize,
    pub outcome: LocaleOutcome,
}

/// Reads a URL list: one URL per line, surrounding whitespace trimmed,
/// blank lines ignored
///
/// Returns `Ok(None)` if the file does not exist.
pub fn read_url_list(path: &Path) -> std::io::Result<Option<Vec<String>>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    Ok(Some(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
    ))
}

/// Creates the dumps directory
///
/// This is the one setup step whose failure aborts the whole harvest.
pub fn prepare_output(config: &Config) -> Result<(), HarvestError> {
    let dir = config.output.dumps_dir();
    std::fs::create_dir_all(dir).map_err(|source| HarvestError::Setup {
        path: dir.to_path_buf(),
        source,
    })
}

/// Seeds the dedup index for `locale` and plans its work queue
///
/// Returns `None` when the locale has no URL list. Nothing is fetched.
pub fn plan_locale(
    config: &Config,
    locale: &str,
) -> Result<Option<(Arc<DedupIndex>, Plan)>, HarvestError> {
    let list_path = config.output.url_list_path(locale);
    let Some(urls) = read_url_list(&list_path)? else {
        return Ok(None);
    };

    let extractor = IdentityExtractor::new(config.harvest.identity_param.clone());
    let dump_path = config.output.dump_path(locale);
    let (index, _) = DedupIndex::seed(&dump_path, config.output.mode, &extractor)?;
    let plan = plan_work(&urls, &config.harvest, &index, &extractor);

    Ok(Some((Arc::new(index), plan)))
}

/// Harvests a single locale
///
/// # Steps
///
/// 1. Read `<urls-dir>/<locale>.txt` (missing list: warn and skip)
/// 2. Seed the dedup index from the existing dump
/// 3. Plan the queue: slice, drop known and unidentified URLs
/// 4. Open the sink and run the worker pool
pub async fn run_locale(
    config: &Config,
    fetcher: &Fetcher,
    locale: &str,
) -> Result<LocaleReport, HarvestError> {
    let Some((index, plan)) = plan_locale(config, locale)? else {
        tracing::warn!(
            "Skip {}: missing {}",
            locale,
            config.output.url_list_path(locale).display()
        );
        return Ok(LocaleReport {
            locale: locale.to_string(),
            seeded: 0,
            outcome: LocaleOutcome::MissingInput,
        });
    };

    let seeded = index.len();
    tracing::info!(
        "Locale {}: {} URLs to fetch (skipping {} already present).",
        locale,
        plan.items.len(),
        seeded
    );
    if plan.unidentified > 0 || plan.repeated > 0 {
        tracing::info!(
            "Locale {}: ignored {} URLs without identity and {} repeated URLs",
            locale,
            plan.unidentified,
            plan.repeated
        );
    }

    if plan.items.is_empty() {
        tracing::info!("Nothing to do for {}.", locale);
        return Ok(LocaleReport {
            locale: locale.to_string(),
            seeded,
            outcome: LocaleOutcome::NothingToDo,
        });
    }

    let dump_path = config.output.dump_path(locale);
    let sink = open_sink(config.output.mode, &dump_path)?;
    let coordinator = Coordinator::new(&config.harvest, fetcher.clone(), index, sink);
    let summary = coordinator.run(plan.items).await?;
    tracing::info!("Wrote {}", dump_path.display());

    Ok(LocaleReport {
        locale: locale.to_string(),
        seeded,
        outcome: LocaleOutcome::Completed(summary),
    })
}

/// Harvests every configured locale in order
///
/// # Example
///
/// ```no_run
/// use sumi_harvest::config::load_config;
/// use sumi_harvest::harvest::run_all;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let reports = run_all(&config).await?;
/// println!("{} locales processed", reports.len());
/// # Ok(())
/// # }
/// ```
pub async fn run_all(config: &Config) -> Result<Vec<LocaleReport>, HarvestError> {
    prepare_output(config)?;
    let fetcher = Fetcher::from_config(config)?;

    let mut reports = Vec::with_capacity(config.locales.len());
    for locale in &config.locales {
        reports.push(run_locale(config, &fetcher, locale).await?);
    }
    Ok(reports)
}
