//! Ordered callback execution without timeouts.

use super::{DispatchMetrics, DispatchQueue};
use crate::config::RunnerConfig;
use crate::errors::Result;
use crate::task::QueueTask;

/// Runs callbacks one at a time, in the order they were added.
///
/// This is the dispatch half of [`TimeoutTaskRunner`](crate::runner::TimeoutTaskRunner)
/// on its own: the worker starts at construction and is released by
/// [`stop`](Self::stop) or on drop.
pub struct QueueTaskRunner<K: Send + 'static> {
    queue: DispatchQueue<QueueTask<K>>,
}

impl<K: Send + 'static> QueueTaskRunner<K> {
    /// Creates a runner with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(RunnerConfig::default())
    }

    /// Creates a runner with the given configuration.
    pub fn with_config(config: RunnerConfig) -> Result<Self> {
        config.validate()?;
        let queue = DispatchQueue::started(&config)?;
        Ok(Self { queue })
    }

    /// Queues `callback` to be invoked with `object_key` and no context.
    pub fn add_task<F>(&self, object_key: K, callback: F) -> bool
    where
        F: FnOnce(K, Option<String>) + Send + 'static,
    {
        self.queue
            .enqueue(QueueTask::new(object_key, Box::new(callback), None))
    }

    /// Queues `callback` to be invoked with `object_key` and `context`.
    pub fn add_task_with_context<F>(
        &self,
        object_key: K,
        callback: F,
        context: impl Into<String>,
    ) -> bool
    where
        F: FnOnce(K, Option<String>) + Send + 'static,
    {
        self.queue.enqueue(QueueTask::new(
            object_key,
            Box::new(callback),
            Some(context.into()),
        ))
    }

    /// Returns the number of callbacks waiting to run.
    #[must_use]
    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// Returns the dispatch metrics.
    #[must_use]
    pub fn metrics(&self) -> &DispatchMetrics {
        self.queue.metrics()
    }

    /// Stops the worker; see [`DispatchQueue::stop`].
    pub fn stop(&self) -> bool {
        self.queue.stop()
    }
}

impl<K: Send + 'static> Drop for QueueTaskRunner<K> {
    fn drop(&mut self) {
        self.queue.stop();
    }
}

impl<K: Send + 'static> std::fmt::Debug for QueueTaskRunner<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueTaskRunner")
            .field("queue", &self.queue)
            .finish()
    }
}
