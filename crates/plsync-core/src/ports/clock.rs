//! Clock port
//!
//! The poll loop measures debounce windows and cache-refresh deadlines
//! through this trait so tests can drive time explicitly.

use std::time::Instant;

/// Source of monotonic time
pub trait IClock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;
}

/// [`IClock`] backed by [`Instant::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl IClock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
