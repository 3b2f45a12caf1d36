//! Progress counters and run summaries
//!
//! Counters only ever increase and are read for reporting; no control flow
//! depends on them.

use crate::state::ItemState;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters updated by workers
#[derive(Debug, Default)]
pub struct ProgressCounters {
    scheduled: AtomicU64,
    attempted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    duplicates: AtomicU64,
    unidentified: AtomicU64,
    finished: AtomicU64,
}

impl ProgressCounters {
    pub fn new(scheduled: u64) -> Self {
        Self {
            scheduled: AtomicU64::new(scheduled),
            ..Self::default()
        }
    }

    /// Records that a worker started fetching an item
    pub fn record_attempt(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the terminal state of an item
    ///
    /// Returns how many items have finished, this one included.
    pub fn record_outcome(&self, state: ItemState) -> u64 {
        let counter = match state {
            ItemState::Accepted => &self.succeeded,
            ItemState::DuplicateSkipped => &self.duplicates,
            ItemState::Unidentified => &self.unidentified,
            ItemState::Failed => &self.failed,
            ItemState::Queued | ItemState::Fetching => {
                return self.finished.load(Ordering::Relaxed)
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
        // Each finishing item observes a distinct count
        self.finished.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            attempted: self.attempted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            unidentified: self.unidentified.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub scheduled: u64,
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub duplicates: u64,
    pub unidentified: u64,
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Fetched {}/{} (ok={}, fail={}, dup={}, unidentified={})",
            self.attempted,
            self.scheduled,
            self.succeeded,
            self.failed,
            self.duplicates,
            self.unidentified
        )
    }
}

/// Final totals of one orchestrated run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub totals: ProgressSnapshot,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Records appended to the destination
    pub fn appended(&self) -> u64 {
        self.totals.succeeded
    }

    /// Items per second over the whole run
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.totals.attempted as f64 / secs
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={}, appended={}, failed={}, duplicates={}, unidentified={} in {:.1}s ({:.1}/s)",
            self.totals.scheduled,
            self.totals.succeeded,
            self.totals.failed,
            self.totals.duplicates,
            self.totals.unidentified,
            self.elapsed.as_secs_f64(),
            self.rate()
        )
    }
}
