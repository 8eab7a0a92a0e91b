//! Warnings deduplicated by message key.
//!
//! Per-step loops can hit the same condition thousands of times a second.
//! Only the first occurrence of each key reaches the log; later ones are
//! counted.

use std::collections::HashMap;
use std::fmt;

/// Logs the first warning for each key and counts the rest.
#[derive(Clone, Debug, Default)]
pub struct WarnOnce {
    seen: HashMap<&'static str, u64>,
}

impl WarnOnce {
    /// Create an empty deduplicator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an occurrence of `key`, logging `args` if it is the first.
    ///
    /// Returns `true` when the message was logged.
    pub fn warn(&mut self, key: &'static str, args: fmt::Arguments<'_>) -> bool {
        let count = self.seen.entry(key).or_insert(0);
        *count += 1;
        if *count == 1 {
            log::warn!("{args}");
            true
        } else {
            log::trace!("suppressed repeat warning '{key}' ({count})");
            false
        }
    }

    /// How many times `key` has occurred.
    pub fn count(&self, key: &str) -> u64 {
        self.seen.get(key).copied().unwrap_or(0)
    }

    /// Forget every key so the next occurrence logs again.
    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_only_first_occurrence() {
        let mut w = WarnOnce::new();
        assert!(w.warn("stale", format_args!("stale index {}", 3)));
        assert!(!w.warn("stale", format_args!("stale index {}", 4)));
        assert!(w.warn("other", format_args!("other")));
        assert_eq!(w.count("stale"), 2);
        assert_eq!(w.count("missing"), 0);

        w.clear();
        assert!(w.warn("stale", format_args!("again")));
    }
}
