//! Shared FIFO work queue
//!
//! Workers pop items under a lock, so every item is handed to exactly one
//! worker. Nothing is pushed back once the run has started.

use std::collections::VecDeque;
use std::sync::Mutex;

/// A single URL to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// The URL to fetch
    pub url: String,

    /// Identity derived from the URL's query
    pub identity: String,

    /// Position in the input list (after start/limit slicing)
    pub position: usize,
}

/// FIFO queue shared by the workers of one run
#[derive(Debug)]
pub struct WorkQueue {
    items: Mutex<VecDeque<WorkItem>>,
}

impl WorkQueue {
    pub fn new(items: Vec<WorkItem>) -> Self {
        Self {
            items: Mutex::new(items.into()),
        }
    }

    /// Pops the next item, or `None` once the queue is drained
    pub fn next(&self) -> Option<WorkItem> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }
}
