/// Work item state definitions for tracking harvest progress
///
/// Every work item moves `Queued -> Fetching -> {Accepted, DuplicateSkipped,
/// Unidentified, Failed}` exactly once. Items are never re-queued; retries
/// happen inside a single `Fetching` step.
use std::fmt;

/// Represents the current state of a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    // ===== Active States =====
    /// Item is waiting in the work queue
    Queued,

    /// A worker owns the item and is fetching it (including retries)
    Fetching,

    // ===== Terminal Success States =====
    /// Record was appended to the output
    Accepted,

    // ===== Terminal Skip States =====
    /// Record identity was already present in the dedup index
    DuplicateSkipped,

    /// Record was fetched but no identity could be derived from it
    Unidentified,

    // ===== Terminal Error States =====
    /// Fetch failed after exhausting its attempts, or the append failed
    Failed,
}

impl ItemState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if this is an active state (item may still be processed)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Fetching)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Returns true if the item was fetched but deliberately not written
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::DuplicateSkipped | Self::Unidentified)
    }

    /// Returns true if this represents an error state
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: ItemState) -> bool {
        match self {
            Self::Queued => next == Self::Fetching,
            Self::Fetching => next.is_terminal(),
            _ => false,
        }
    }

    /// Short label used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::Accepted => "accepted",
            Self::DuplicateSkipped => "duplicate_skipped",
            Self::Unidentified => "unidentified",
            Self::Failed => "failed",
        }
    }

    /// Returns all possible item states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Queued,
            Self::Fetching,
            Self::Accepted,
            Self::DuplicateSkipped,
            Self::Unidentified,
            Self::Failed,
        ]
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
