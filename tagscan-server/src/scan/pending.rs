//! Single-slot registry of the most recent unbound tag

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Holds at most one armed tag awaiting a bind; empty string means none
///
/// Last write wins: a newer unknown scan replaces the armed value.
#[derive(Debug, Default)]
pub struct PendingTagRegistry {
    slot: Mutex<String>,
}

impl PendingTagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, String> {
        // The slot is a plain String; a panic mid-assignment cannot leave it torn
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn arm(&self, tag: &str) {
        let mut slot = self.slot();
        slot.clear();
        slot.push_str(tag);
    }

    /// Current armed tag, or an empty string
    pub fn peek(&self) -> String {
        self.slot().clone()
    }

    /// Clear only if `tag` is still the armed value
    ///
    /// Returns true when the slot was cleared. Binding a different tag must not
    /// erase a newer pending scan.
    pub fn clear_if_matches(&self, tag: &str) -> bool {
        let mut slot = self.slot();
        if !slot.is_empty() && *slot == tag {
            slot.clear();
            true
        } else {
            false
        }
    }

    pub fn clear(&self) {
        self.slot().clear();
    }
}
