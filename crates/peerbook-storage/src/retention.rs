//! Record retention policy
//!
//! Caps how many signed records are kept per peer. Records are ranked by
//! sequence number; only the highest `max_records_per_peer` survive a trim.

use serde::{Deserialize, Serialize};

/// Default number of signed records kept per peer
pub const DEFAULT_MAX_RECORDS_PER_PEER: usize = 3;

/// Keeps the N highest-sequence records per peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    max_records_per_peer: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_records_per_peer: DEFAULT_MAX_RECORDS_PER_PEER,
        }
    }
}

impl RetentionPolicy {
    /// Create a policy with the given cap
    pub fn new(max_records_per_peer: usize) -> Self {
        Self {
            max_records_per_peer,
        }
    }

    /// Maximum number of records kept per peer
    pub fn max_records_per_peer(&self) -> usize {
        self.max_records_per_peer
    }

    /// Whether a peer holding `count` records exceeds the cap
    pub fn exceeds(&self, count: usize) -> bool {
        count > self.max_records_per_peer
    }

    /// Select the records to delete
    ///
    /// `sorted_desc` must be ordered by sequence, highest first. Returns the
    /// tail past the cap, or an empty slice if nothing needs to go.
    pub fn records_to_remove<'a, T>(&self, sorted_desc: &'a [T]) -> &'a [T] {
        if !self.exceeds(sorted_desc.len()) {
            return &[];
        }
        &sorted_desc[self.max_records_per_peer..]
    }
}
