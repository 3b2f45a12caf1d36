//! Output sink traits and types
//!
//! This module defines the trait interface for durable record sinks and the
//! errors they report.

use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Sink for {0} is already closed")]
    Closed(PathBuf),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Trait for durable record sinks
///
/// Sinks are shared by every worker of a run, so implementations must be
/// thread-safe and must serialize writes: each call to [`write`] lands as one
/// complete unit, never interleaved with another worker's record.
///
/// [`write`]: RecordSink::write
pub trait RecordSink: Send + Sync {
    /// Destination this sink writes to
    fn path(&self) -> &Path;

    /// Accepts one record
    ///
    /// # Arguments
    ///
    /// * `record` - The fetched JSON record
    fn write(&self, record: &Value) -> OutputResult<()>;

    /// Number of records accepted by this sink so far
    fn written(&self) -> u64;

    /// Flushes and releases the destination
    ///
    /// Returns the number of records written during this run. Writes after
    /// `close` fail with [`OutputError::Closed`]; closing twice is a no-op.
    fn close(&self) -> OutputResult<u64>;
}
