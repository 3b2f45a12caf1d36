//! Statistics over existing dump files
//!
//! This module scans a destination and reports how many records it holds,
//! how many distinct identities they cover, and how much of it is unreadable.

use crate::config::OutputMode;
use crate::identity::IdentityExtractor;
use crate::output::{json_array, ndjson, OutputResult};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

/// Summary of a single dump file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpStatistics {
    /// Records that parsed as JSON
    pub records: u64,

    /// Distinct identities among those records
    pub identities: u64,

    /// Records whose identity was already seen earlier in the file
    pub duplicate_identities: u64,

    /// Records from which no identity could be derived
    pub unidentified: u64,

    /// Lines that failed to parse (NDJSON only)
    pub unreadable_lines: u64,
}

impl DumpStatistics {
    fn observe(
        &mut self,
        record: &Value,
        extractor: &IdentityExtractor,
        seen: &mut HashSet<String>,
    ) {
        self.records += 1;
        match extractor.from_record(record) {
            Some(id) => {
                if seen.insert(id) {
                    self.identities += 1;
                } else {
                    self.duplicate_identities += 1;
                }
            }
            None => self.unidentified += 1,
        }
    }
}

/// Loads statistics for the dump at `path`
///
/// A missing file yields all-zero statistics.
pub fn load_statistics(
    path: &Path,
    mode: OutputMode,
    extractor: &IdentityExtractor,
) -> OutputResult<DumpStatistics> {
    let mut stats = DumpStatistics::default();
    let mut seen = HashSet::new();

    match mode {
        OutputMode::Ndjson => {
            ndjson::scan_records(path, |_, parsed| match parsed {
                Ok(record) => stats.observe(&record, extractor, &mut seen),
                Err(_) => stats.unreadable_lines += 1,
            })?;
        }
        OutputMode::JsonArray => {
            for record in json_array::read_array(path)? {
                stats.observe(&record, extractor, &mut seen);
            }
        }
    }

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(locale: &str, path: &Path, stats: &DumpStatistics) {
    println!("Locale {} ({}):", locale, path.display());
    println!("  Records: {}", stats.records);
    println!("  Distinct identities: {}", stats.identities);
    if stats.duplicate_identities > 0 {
        println!("  Duplicate identities: {}", stats.duplicate_identities);
    }
    if stats.unidentified > 0 {
        println!("  Records without identity: {}", stats.unidentified);
    }
    if stats.unreadable_lines > 0 {
        println!("  Unreadable lines: {}", stats.unreadable_lines);
    }
    println!();
}
