//! Output module for durable record storage
//!
//! This module handles:
//! - Appending accepted records to NDJSON dumps, one record per line
//! - Merging records into JSON array dumps, rewritten atomically on close
//! - Reporting statistics over existing dumps

mod json_array;
mod ndjson;
pub mod stats;
mod traits;

pub use json_array::{read_array, JsonArraySink};
pub use ndjson::{scan_records, NdjsonSink};
pub use stats::{load_statistics, print_statistics, DumpStatistics};
pub use traits::{OutputError, OutputResult, RecordSink};

use crate::config::OutputMode;
use std::path::Path;
use std::sync::Arc;

/// Opens the sink matching `mode` for `path`
///
/// A destination is only ever written through one discipline; the mode
/// picks which.
pub fn open_sink(mode: OutputMode, path: &Path) -> OutputResult<Arc<dyn RecordSink>> {
    let sink: Arc<dyn RecordSink> = match mode {
        OutputMode::Ndjson => Arc::new(NdjsonSink::open(path)?),
        OutputMode::JsonArray => Arc::new(JsonArraySink::open(path)?),
    };
    Ok(sink)
}
