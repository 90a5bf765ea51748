//! Resume position tracking for friendlychat.
//!
//! This module tracks the highest sequence key a feed has applied:
//! - It is the `after` argument of the next subscription
//! - Keys at or below it are stale (already applied or out of order)
//! - It survives stop/start, and only `reset` forgets it
//!
//! Sequence keys are assigned by the store and strictly increase in append
//! order, but they need not be contiguous.

use chat_types::SequenceKey;

/// Tracks the resume position of a feed and rejects stale keys.
#[derive(Debug, Clone, Default)]
pub struct ResumeTracker {
    /// Highest key applied so far.
    last: Option<SequenceKey>,
    /// Number of keys accepted since the last reset.
    accepted: u64,
    /// Number of keys rejected as stale since the last reset.
    rejected: u64,
}

impl ResumeTracker {
    /// Create a tracker with no position (subscribe from the beginning).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker resuming after a known key.
    ///
    /// This is useful when resuming from a persisted position.
    pub fn with_position(key: SequenceKey) -> Self {
        Self {
            last: Some(key),
            ..Self::default()
        }
    }

    /// Record a delivered key.
    ///
    /// Returns `true` if the key is newer than everything applied so far and
    /// should be applied; `false` if it is a duplicate or out of order.
    pub fn accept(&mut self, key: SequenceKey) -> bool {
        match self.last {
            Some(last) if key <= last => {
                self.rejected += 1;
                false
            }
            _ => {
                self.last = Some(key);
                self.accepted += 1;
                true
            }
        }
    }

    /// The resume position, `None` before anything was applied.
    pub fn position(&self) -> Option<SequenceKey> {
        self.last
    }

    /// Number of keys accepted since the last reset.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Number of stale keys rejected since the last reset.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Forget the position so the next subscription replays everything.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
