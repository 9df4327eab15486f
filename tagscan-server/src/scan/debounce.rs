//! One-deep repeat suppression for scans

use std::sync::{Mutex, PoisonError};

/// Suppresses a scan identical to the one immediately before it
///
/// Not time-windowed: `A, B, A` processes both `A` scans.
#[derive(Debug, Default)]
pub struct DebounceFilter {
    last_seen: Mutex<String>,
}

impl DebounceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `tag` equals the last seen tag; otherwise records it and returns false
    pub fn should_suppress(&self, tag: &str) -> bool {
        let mut last_seen = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
        if *last_seen == tag {
            return true;
        }
        last_seen.clear();
        last_seen.push_str(tag);
        false
    }
}
