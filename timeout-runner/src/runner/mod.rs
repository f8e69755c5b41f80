//! The timeout task runner.
//!
//! Ties the registry, the expiry scanner and the dispatch queue together.
//! Each task moves `pending -> dispatching -> done`, or
//! `pending -> cancelled` when removed before the scanner drains it.

mod integration_tests;

use crate::clock::{Clock, SystemClock};
use crate::config::RunnerConfig;
use crate::dispatch::{DispatchMetrics, DispatchQueue};
use crate::errors::Result;
use crate::registry::TimeoutRegistry;
use crate::scanner::ExpiryScanner;
use crate::task::{TaskId, TimeoutTask};
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Fires callbacks once their timeout elapses unless cancelled first.
///
/// The scanner and the dispatch worker start at construction. Call
/// [`stop`](Self::stop) (or drop the runner) to release both threads;
/// tasks still pending at that point are discarded without firing.
///
/// ```rust,ignore
/// let runner = TimeoutTaskRunner::new()?;
/// let id = runner.add("conn-42", 30, |key, _| close_idle(key));
/// // activity seen: push the deadline back
/// runner.remove_by_task_id(id);
/// runner.add("conn-42", 30, |key, _| close_idle(key));
/// ```
pub struct TimeoutTaskRunner<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    registry: Arc<TimeoutRegistry<K>>,
    dispatcher: DispatchQueue<TimeoutTask<K>>,
    scanner: ExpiryScanner,
    stopped: AtomicBool,
}

impl<K> TimeoutTaskRunner<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    /// Creates and starts a runner with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(RunnerConfig::default())
    }

    /// Creates and starts a runner using the system clock.
    pub fn with_config(config: RunnerConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates and starts a runner reading second ticks from `clock`.
    pub fn with_clock(config: RunnerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let registry: Arc<TimeoutRegistry<K>> = Arc::new(TimeoutRegistry::new(clock.clone()));
        let dispatcher: DispatchQueue<TimeoutTask<K>> = DispatchQueue::started(&config)?;
        let scanner = match ExpiryScanner::start(
            registry.clone(),
            dispatcher.sender(),
            clock,
            config.scan_interval(),
            format!("{}-scanner", config.thread_name),
        ) {
            Ok(scanner) => scanner,
            Err(e) => {
                dispatcher.stop();
                return Err(e);
            }
        };

        info!(
            thread = %config.thread_name,
            scan_interval_ms = config.scan_interval_ms,
            "Timeout task runner started"
        );

        Ok(Self {
            registry,
            dispatcher,
            scanner,
            stopped: AtomicBool::new(false),
        })
    }

    /// Registers `callback` to fire `timeout_seconds` from now with no context.
    pub fn add<F>(&self, object_key: K, timeout_seconds: i64, callback: F) -> TaskId
    where
        F: FnOnce(K, Option<String>) + Send + 'static,
    {
        self.registry.add(object_key, timeout_seconds, callback, None)
    }

    /// Registers `callback` to fire `timeout_seconds` from now with `context`.
    pub fn add_with_context<F>(
        &self,
        object_key: K,
        timeout_seconds: i64,
        callback: F,
        context: impl Into<String>,
    ) -> TaskId
    where
        F: FnOnce(K, Option<String>) + Send + 'static,
    {
        self.registry
            .add(object_key, timeout_seconds, callback, Some(context.into()))
    }

    /// Cancels every pending task for `object_key`.
    ///
    /// Tasks already handed to the dispatch worker still fire.
    pub fn remove_by_object_key(&self, object_key: &K) -> usize {
        self.registry.remove_by_object_key(object_key)
    }

    /// Cancels one pending task. Unknown or already fired ids are ignored.
    pub fn remove_by_task_id(&self, task_id: TaskId) -> bool {
        self.registry.remove_by_task_id(task_id)
    }

    /// Returns true while the task is registered and not yet due.
    #[must_use]
    pub fn is_pending(&self, task_id: TaskId) -> bool {
        self.registry.contains(task_id)
    }

    /// Returns the number of registered tasks not yet drained.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.registry.len()
    }

    /// Returns the number of expired tasks waiting for the dispatch worker.
    #[must_use]
    pub fn queued_count(&self) -> usize {
        self.dispatcher.len()
    }

    /// Returns the earliest pending deadline as a second tick.
    #[must_use]
    pub fn next_deadline(&self) -> Option<i64> {
        self.registry.next_deadline()
    }

    /// Returns the dispatch metrics.
    #[must_use]
    pub fn metrics(&self) -> &DispatchMetrics {
        self.dispatcher.metrics()
    }

    /// Stops the scanner, then the dispatch worker, then discards pending tasks.
    ///
    /// Returns false if the dispatch worker did not exit within the shutdown
    /// timeout. Calling `stop` again is a no-op.
    pub fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return true;
        }

        self.scanner.stop();
        let clean = self.dispatcher.stop();
        let discarded = self.registry.clear();

        debug!(discarded, clean, "Timeout task runner is destroyed");
        clean
    }
}

impl<K> Drop for TimeoutTaskRunner<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    fn drop(&mut self) {
        self.stop();
    }
}

impl<K> std::fmt::Debug for TimeoutTaskRunner<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutTaskRunner")
            .field("registry", &self.registry)
            .field("dispatcher", &self.dispatcher)
            .field("scanner", &self.scanner)
            .field("stopped", &self.stopped.load(Ordering::SeqCst))
            .finish()
    }
}
