//! Task records handed from the registry to the dispatch worker.

use super::TaskId;
use crate::dispatch::Dispatch;
use std::fmt;

/// Callback invoked with the object key and context of a fired task.
pub type TaskCallback<K> = Box<dyn FnOnce(K, Option<String>) + Send + 'static>;

/// A pending timeout registration.
pub struct TimeoutTask<K> {
    task_id: TaskId,
    object_key: K,
    timeout_seconds: i64,
    deadline_tick: i64,
    callback: TaskCallback<K>,
    context: Option<String>,
}

impl<K> TimeoutTask<K> {
    /// Creates a task due at `now + timeout_seconds`.
    pub fn new(
        task_id: TaskId,
        object_key: K,
        timeout_seconds: i64,
        now_tick: i64,
        callback: TaskCallback<K>,
        context: Option<String>,
    ) -> Self {
        Self {
            task_id,
            object_key,
            timeout_seconds,
            deadline_tick: now_tick.saturating_add(timeout_seconds),
            callback,
            context,
        }
    }

    /// Returns the task id.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the object key.
    #[must_use]
    pub const fn object_key(&self) -> &K {
        &self.object_key
    }

    /// Returns the requested timeout.
    #[must_use]
    pub const fn timeout_seconds(&self) -> i64 {
        self.timeout_seconds
    }

    /// Returns the second tick at which the task becomes due.
    #[must_use]
    pub const fn deadline_tick(&self) -> i64 {
        self.deadline_tick
    }

    /// Returns the caller context.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns true if the task is due at `now_tick`.
    #[must_use]
    pub const fn is_due(&self, now_tick: i64) -> bool {
        self.deadline_tick <= now_tick
    }
}

impl<K: Send + 'static> Dispatch for TimeoutTask<K> {
    fn dispatch(self) {
        (self.callback)(self.object_key, self.context);
    }

    fn task_id(&self) -> Option<TaskId> {
        Some(self.task_id)
    }
}

impl<K: fmt::Debug> fmt::Debug for TimeoutTask<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutTask")
            .field("task_id", &self.task_id)
            .field("object_key", &self.object_key)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("deadline_tick", &self.deadline_tick)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// A callback queued for ordered execution without any timeout.
pub struct QueueTask<K> {
    object_key: K,
    callback: TaskCallback<K>,
    context: Option<String>,
}

impl<K> QueueTask<K> {
    /// Creates a queue task.
    pub fn new(object_key: K, callback: TaskCallback<K>, context: Option<String>) -> Self {
        Self {
            object_key,
            callback,
            context,
        }
    }

    /// Returns the object key.
    #[must_use]
    pub const fn object_key(&self) -> &K {
        &self.object_key
    }

    /// Returns the caller context.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

impl<K: Send + 'static> Dispatch for QueueTask<K> {
    fn dispatch(self) {
        (self.callback)(self.object_key, self.context);
    }
}

impl<K: fmt::Debug> fmt::Debug for QueueTask<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueTask")
            .field("object_key", &self.object_key)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
