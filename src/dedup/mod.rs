//! Deduplication index
//!
//! The set of record identities already persisted, shared by every worker of
//! a run. It is seeded from the existing destination at startup and only ever
//! grows afterwards.

use crate::config::OutputMode;
use crate::identity::IdentityExtractor;
use crate::output::{read_array, scan_records, OutputResult};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Concurrency-safe set of known record identities
#[derive(Debug, Default)]
pub struct DedupIndex {
    ids: Mutex<HashSet<String>>,
}

/// Outcome of seeding an index from a destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Records whose identity was inserted
    pub seeded: u64,

    /// Lines that did not parse as JSON
    pub unreadable: u64,

    /// Records that parsed but carried no identity
    pub unidentified: u64,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an index from the destination at `path`
    ///
    /// Records that fail to parse or lack an identity are skipped, so a torn
    /// trailing line from an interrupted run never aborts seeding. A missing
    /// destination yields an empty index.
    pub fn seed(
        path: &Path,
        mode: OutputMode,
        extractor: &IdentityExtractor,
    ) -> OutputResult<(Self, SeedReport)> {
        let index = Self::new();
        let mut report = SeedReport::default();
        let mut unreadable = 0;

        {
            let mut ids = index.lock();
            let mut observe = |record: &serde_json::Value| match extractor.from_record(record) {
                Some(id) => {
                    ids.insert(id);
                    report.seeded += 1;
                }
                None => report.unidentified += 1,
            };

            match mode {
                OutputMode::Ndjson => scan_records(path, |line_no, parsed| match parsed {
                    Ok(record) => observe(&record),
                    Err(e) => {
                        tracing::debug!(
                            "Skipping unreadable line {} of {}: {}",
                            line_no,
                            path.display(),
                            e
                        );
                        unreadable += 1;
                    }
                })?,
                OutputMode::JsonArray => {
                    for record in read_array(path)? {
                        observe(&record);
                    }
                }
            }
        }
        report.unreadable = unreadable;

        if report.unreadable > 0 {
            tracing::warn!(
                "Skipped {} unreadable lines while seeding from {}",
                report.unreadable,
                path.display()
            );
        }

        Ok((index, report))
    }

    /// Returns true if `id` is already known
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    /// Inserts `id`, returning true if it was not present before
    ///
    /// The check and the insert happen under one lock, so when two workers
    /// race on the same identity exactly one of them sees `true`.
    pub fn insert(&self, id: impl Into<String>) -> bool {
        self.lock().insert(id.into())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // A panic while holding the lock cannot leave the set half-updated
        self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<S: Into<String>> FromIterator<S> for DedupIndex {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: Mutex::new(iter.into_iter().map(Into::into).collect()),
        }
    }
}
