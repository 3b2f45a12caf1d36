//! Sumi-Harvest: a resilient JSON resource harvester
//!
//! This crate fetches a bounded list of JSON resources identified by URLs,
//! retrying through throttling and transient failures, and appends every
//! accepted record to durable output that can be resumed across runs.

pub mod config;
pub mod dedup;
pub mod harvest;
pub mod identity;
pub mod output;
pub mod state;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Sumi-Harvest operations
///
/// Only run-level failures surface here. Failures of individual fetches are
/// reported as [`harvest::FetchResult::Failure`] values and never abort a run.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Failed to prepare {path}: {source}")]
    Setup {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid header in config: {0}")]
    InvalidHeader(String),
}

/// Result type alias for Sumi-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use dedup::DedupIndex;
pub use harvest::{Coordinator, FetchResult, Fetcher, RunSummary};
pub use identity::{identity_from_record, identity_from_url, IdentityExtractor};
pub use state::ItemState;
