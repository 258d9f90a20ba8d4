//! Debounce timers for detected changes
//!
//! A change must persist for the configured delay, measured from the first
//! time it was seen, before it is acted on. Re-detecting the change inside
//! the window does not restart the timer, so a file that keeps changing is
//! still synced after the delay.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::debug;

/// First-seen instants of pending changes, keyed by document path
#[derive(Debug)]
pub struct DebounceTable {
    first_seen: HashMap<PathBuf, Instant>,
    delay: Duration,
}

impl DebounceTable {
    pub fn new(delay: Duration) -> Self {
        Self {
            first_seen: HashMap::new(),
            delay,
        }
    }

    /// Notes a change on `path` at `now` and reports whether it is due
    ///
    /// The first observation starts the timer. The change is due once
    /// `now - first_seen >= delay`.
    pub fn observe(&mut self, path: &Path, now: Instant) -> bool {
        let first = *self.first_seen.entry(path.to_path_buf()).or_insert_with(|| {
            debug!(path = %path.display(), "Change detected, starting debounce");
            now
        });
        now.saturating_duration_since(first) >= self.delay
    }

    /// Forgets any pending change on `path`
    pub fn clear(&mut self, path: &Path) {
        self.first_seen.remove(path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.first_seen.contains_key(path)
    }

    pub fn first_seen(&self, path: &Path) -> Option<Instant> {
        self.first_seen.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.first_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_seen.is_empty()
    }
}
