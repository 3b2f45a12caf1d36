//! State module for tracking harvest progress
//!
//! `ItemState` tracks the lifecycle of a single work item from the queue to
//! its terminal outcome.

mod item_state;

pub use item_state::ItemState;
