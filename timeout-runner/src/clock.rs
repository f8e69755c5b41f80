//! Whole-second time sources.
//!
//! Deadlines are expressed as second ticks: whole seconds since the Unix
//! epoch. Sub-second precision is intentionally discarded.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// A source of the current second tick.
pub trait Clock: Send + Sync {
    /// Returns the current time truncated to whole seconds.
    fn now_seconds(&self) -> i64;
}

/// Wall-clock time from the system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_seconds(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a clock frozen at the given tick.
    #[must_use]
    pub const fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    /// Sets the current tick.
    pub fn set(&self, tick: i64) {
        self.now.store(tick, Ordering::SeqCst);
    }

    /// Moves the clock forward and returns the new tick.
    pub fn advance(&self, seconds: i64) -> i64 {
        self.now.fetch_add(seconds, Ordering::SeqCst) + seconds
    }
}

impl Clock for ManualClock {
    fn now_seconds(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
