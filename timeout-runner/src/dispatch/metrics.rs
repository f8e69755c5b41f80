//! Counters for the dispatch worker.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for dispatch queue monitoring.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Items accepted by `enqueue`.
    enqueued: AtomicU64,
    /// Callbacks that returned normally.
    completed: AtomicU64,
    /// Callbacks that panicked.
    failed: AtomicU64,
    /// Items rejected after stop or discarded at stop.
    dropped: AtomicU64,
}

impl DispatchMetrics {
    /// Records an accepted item.
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a callback that returned normally.
    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a panicking callback.
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records items that will never run.
    pub fn record_dropped(&self, count: u64) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
    }

    /// Returns the number of accepted items.
    #[must_use]
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Returns the number of completed callbacks.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Returns the number of panicking callbacks.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Returns the number of items that never ran.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of callbacks that ran, whether or not they panicked.
    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.completed() + self.failed()
    }

    /// Converts metrics to a dictionary.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "enqueued": self.enqueued(),
            "completed": self.completed(),
            "failed": self.failed(),
            "dropped": self.dropped(),
        })
    }
}
