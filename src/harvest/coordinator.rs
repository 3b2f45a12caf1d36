//! Harvest coordinator - worker pool orchestration
//!
//! This module contains the worker loop that coordinates a run:
//! - Planning the work queue from input URLs and the dedup index
//! - Fanning out a bounded number of workers over the shared queue
//! - Deduplicating fetched records and appending them to the sink
//! - Reporting progress and final totals

use crate::config::HarvestConfig;
use crate::dedup::DedupIndex;
use crate::harvest::fetcher::{jitter_delay, FetchResult, Fetcher};
use crate::harvest::progress::{ProgressCounters, RunSummary};
use crate::harvest::queue::{WorkItem, WorkQueue};
use crate::identity::IdentityExtractor;
use crate::output::RecordSink;
use crate::state::ItemState;
use crate::HarvestError;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Work derived from an input list, before any fetch
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Items to fetch, in input order
    pub items: Vec<WorkItem>,

    /// URLs left after start/limit slicing
    pub considered: usize,

    /// URLs whose identity is already persisted
    pub already_present: usize,

    /// URLs repeating an identity seen earlier in the same list
    pub repeated: usize,

    /// URLs from which no identity could be derived
    pub unidentified: usize,
}

/// State shared by every worker of a run
struct Shared {
    fetcher: Fetcher,
    index: Arc<DedupIndex>,
    sink: Arc<dyn RecordSink>,
    extractor: IdentityExtractor,
    counters: ProgressCounters,
    queue: WorkQueue,
    progress_interval: u64,
    pause_min: Duration,
    pause_max: Duration,
}

/// Main harvest coordinator structure
pub struct Coordinator {
    fetcher: Fetcher,
    index: Arc<DedupIndex>,
    sink: Arc<dyn RecordSink>,
    extractor: IdentityExtractor,
    concurrency: usize,
    progress_interval: u64,
    pause_min: Duration,
    pause_max: Duration,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - Worker pool settings
    /// * `fetcher` - Performs each logical fetch
    /// * `index` - Identities already persisted, shared with the caller
    /// * `sink` - Destination for accepted records
    pub fn new(
        config: &HarvestConfig,
        fetcher: Fetcher,
        index: Arc<DedupIndex>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            fetcher,
            index,
            sink,
            extractor: IdentityExtractor::new(config.identity_param.clone()),
            concurrency: config.concurrency.max(1),
            progress_interval: config.progress_interval.max(1),
            pause_min: Duration::from_millis(config.jitter_min_ms),
            pause_max: Duration::from_millis(config.jitter_max_ms),
        }
    }

    /// Builds the work queue for `urls`
    ///
    /// See [`plan_work`].
    pub fn plan(&self, urls: &[String], config: &HarvestConfig) -> Plan {
        plan_work(urls, config, &self.index, &self.extractor)
    }

    /// Runs the worker pool until the queue is drained
    ///
    /// Spawns `min(concurrency, items)` workers. Each one pops an item,
    /// fetches it, and either appends the record, skips it as a duplicate,
    /// or logs and counts the failure. A failing item never stops the pool.
    /// Once every worker has exited the sink is closed.
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - Final totals for the run
    /// * `Err(HarvestError)` - A worker panicked or the sink failed to close
    pub async fn run(self, items: Vec<WorkItem>) -> Result<RunSummary, HarvestError> {
        let started_at = Utc::now();
        let start_time = Instant::now();
        let total = items.len();
        let workers = self.concurrency.min(total);

        tracing::info!(
            "Starting {} workers for {} items -> {}",
            workers,
            total,
            self.sink.path().display()
        );

        let shared = Arc::new(Shared {
            fetcher: self.fetcher,
            index: self.index,
            sink: self.sink,
            extractor: self.extractor,
            counters: ProgressCounters::new(total as u64),
            queue: WorkQueue::new(items),
            progress_interval: self.progress_interval,
            pause_min: self.pause_min,
            pause_max: self.pause_max,
        });

        let mut tasks = JoinSet::new();
        for worker_id in 0..workers {
            tasks.spawn(worker_loop(worker_id, Arc::clone(&shared)));
        }

        let mut worker_error = None;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker task failed: {}", e);
                worker_error.get_or_insert(e);
            }
        }

        // Close even when a worker died, so accepted records are flushed.
        // Batch mode rewrites the whole file here, off the runtime threads.
        let sink = Arc::clone(&shared.sink);
        let closed = tokio::task::spawn_blocking(move || sink.close()).await;

        if let Some(e) = worker_error {
            return Err(e.into());
        }
        closed??;

        let summary = RunSummary {
            totals: shared.counters.snapshot(),
            started_at,
            finished_at: Utc::now(),
            elapsed: start_time.elapsed(),
        };

        tracing::info!("Done: {}", summary);
        Ok(summary)
    }
}

/// Builds the work queue for one input list
///
/// Applies `start`/`limit` slicing, then drops URLs without an identity, URLs
/// whose identity is already in `index`, and URLs repeating an identity seen
/// earlier in the list. No fetch happens here.
pub fn plan_work(
    urls: &[String],
    config: &HarvestConfig,
    index: &DedupIndex,
    extractor: &IdentityExtractor,
) -> Plan {
    let sliced = urls
        .iter()
        .skip(config.start)
        .take(config.limit().unwrap_or(usize::MAX));

    let mut plan = Plan::default();
    let mut planned = HashSet::new();

    for (position, url) in sliced.enumerate() {
        plan.considered += 1;

        let Some(identity) = extractor.from_url(url) else {
            tracing::debug!("No identity in {}, skipping", url);
            plan.unidentified += 1;
            continue;
        };

        if index.contains(&identity) {
            plan.already_present += 1;
            continue;
        }

        if !planned.insert(identity.clone()) {
            plan.repeated += 1;
            continue;
        }

        plan.items.push(WorkItem {
            url: url.clone(),
            identity,
            position,
        });
    }

    plan
}

/// Repeatedly pops and processes items until the queue is empty
async fn worker_loop(worker_id: usize, shared: Arc<Shared>) {
    tracing::debug!("Worker {} started", worker_id);

    while let Some(item) = shared.queue.next() {
        let state = process_item(&shared, &item).await;
        let finished = shared.counters.record_outcome(state);

        if finished % shared.progress_interval == 0 {
            tracing::info!("{}", shared.counters.snapshot());
        }

        tokio::time::sleep(jitter_delay(shared.pause_min, shared.pause_max)).await;
    }

    tracing::debug!("Worker {} finished", worker_id);
}

/// Takes one item from `Queued` to a terminal state
async fn process_item(shared: &Shared, item: &WorkItem) -> ItemState {
    let state = transition(item, ItemState::Queued, ItemState::Fetching);
    shared.counters.record_attempt();

    let next = match shared.fetcher.fetch(&item.url).await {
        FetchResult::Success { payload, attempts } => {
            match shared.extractor.from_record(&payload) {
                None => {
                    tracing::debug!("No identity in record from {}, skipping", item.url);
                    ItemState::Unidentified
                }
                Some(id) => {
                    if id != item.identity {
                        tracing::debug!(
                            "Record from {} identifies as {} (requested {})",
                            item.url,
                            id,
                            item.identity
                        );
                    }

                    // Check-and-insert is atomic; only one worker wins an identity
                    if !shared.index.insert(id) {
                        ItemState::DuplicateSkipped
                    } else {
                        match shared.sink.write(&payload) {
                            Ok(()) => {
                                tracing::trace!(
                                    "Appended {} after {} attempts",
                                    item.url,
                                    attempts
                                );
                                ItemState::Accepted
                            }
                            Err(e) => {
                                tracing::error!("Failed to append record from {}: {}", item.url, e);
                                ItemState::Failed
                            }
                        }
                    }
                }
            }
        }
        FetchResult::Failure {
            kind,
            url,
            detail,
            attempts,
        } => {
            tracing::warn!("[{}] {} after {} attempts: {}", kind, url, attempts, detail);
            ItemState::Failed
        }
    };

    transition(item, state, next)
}

fn transition(item: &WorkItem, from: ItemState, to: ItemState) -> ItemState {
    debug_assert!(
        from.can_transition_to(to),
        "illegal transition {} -> {} for {}",
        from,
        to,
        item.url
    );
    tracing::trace!("{}: {} -> {}", item.url, from, to);
    to
}
