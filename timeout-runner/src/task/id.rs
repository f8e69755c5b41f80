//! Task identifiers and their allocator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ids live in `0..i64::MAX` and wrap back to zero after the last one.
const WRAP_AT: u64 = i64::MAX as u64;

/// Engine-assigned identifier of one timeout registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TaskId> for u64 {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

/// Hands out monotonically increasing task ids.
///
/// The first id is 1. After `i64::MAX - 1` the counter wraps to 0; an id
/// still pending at that point could then be issued twice. This is not
/// detected: it takes 2^63 registrations to get there.
#[derive(Debug, Default)]
pub struct TaskIdAllocator {
    last: AtomicU64,
}

impl TaskIdAllocator {
    /// Creates an allocator whose first id is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Creates an allocator that continues after `last`.
    #[must_use]
    pub const fn resume_after(last: u64) -> Self {
        Self {
            last: AtomicU64::new(last % WRAP_AT),
        }
    }

    /// Returns the next id.
    pub fn next(&self) -> TaskId {
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(advance(current))
            })
            .unwrap_or_else(|current| current);
        TaskId(advance(previous))
    }

    /// Returns the most recently issued id without advancing.
    #[must_use]
    pub fn last_issued(&self) -> TaskId {
        TaskId(self.last.load(Ordering::SeqCst))
    }
}

const fn advance(current: u64) -> u64 {
    (current + 1) % WRAP_AT
}
