//! Thread-safe store of pending timeout tasks.
//!
//! Tasks are indexed by id, by object key and by deadline. All three indices
//! sit behind a single mutex and are only ever changed together, so a task is
//! either in all of them or in none. Callers never see the indices directly.

use crate::clock::Clock;
use crate::task::{TaskId, TaskIdAllocator, TimeoutTask};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

struct Indices<K> {
    by_id: HashMap<TaskId, TimeoutTask<K>>,
    by_key: HashMap<K, Vec<TaskId>>,
    by_deadline: BTreeSet<(i64, TaskId)>,
}

impl<K: Eq + Hash> Indices<K> {
    fn new() -> Self {
        Self {
            by_id: HashMap::new(),
            by_key: HashMap::new(),
            by_deadline: BTreeSet::new(),
        }
    }

    fn detach_from_key(&mut self, key: &K, task_id: TaskId) {
        if let Some(ids) = self.by_key.get_mut(key) {
            ids.retain(|id| *id != task_id);
            if ids.is_empty() {
                self.by_key.remove(key);
            }
        }
    }
}

/// Dual-indexed registry of pending timeout tasks.
pub struct TimeoutRegistry<K> {
    indices: Mutex<Indices<K>>,
    ids: TaskIdAllocator,
    clock: Arc<dyn Clock>,
}

impl<K> TimeoutRegistry<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    /// Creates an empty registry reading deadlines from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_allocator(clock, TaskIdAllocator::new())
    }

    /// Creates an empty registry with a custom id allocator.
    #[must_use]
    pub fn with_allocator(clock: Arc<dyn Clock>, ids: TaskIdAllocator) -> Self {
        Self {
            indices: Mutex::new(Indices::new()),
            ids,
            clock,
        }
    }

    /// Registers a task due `timeout_seconds` from now and returns its id.
    ///
    /// Zero or negative timeouts are due on the next scan.
    pub fn add<F>(
        &self,
        object_key: K,
        timeout_seconds: i64,
        callback: F,
        context: Option<String>,
    ) -> TaskId
    where
        F: FnOnce(K, Option<String>) + Send + 'static,
    {
        let task_id = self.ids.next();
        let task = TimeoutTask::new(
            task_id,
            object_key.clone(),
            timeout_seconds,
            self.clock.now_seconds(),
            Box::new(callback),
            context,
        );
        let deadline = task.deadline_tick();

        {
            let mut indices = self.indices.lock();
            indices.by_deadline.insert((deadline, task_id));
            indices.by_key.entry(object_key).or_default().push(task_id);
            indices.by_id.insert(task_id, task);
        }

        debug!(task_id = %task_id, timeout_seconds, deadline, "Timeout task registered");
        task_id
    }

    /// Removes every task registered under `object_key`.
    ///
    /// Returns the number of tasks removed; an unknown key removes nothing.
    pub fn remove_by_object_key(&self, object_key: &K) -> usize {
        let removed = {
            let mut indices = self.indices.lock();
            let Some(ids) = indices.by_key.remove(object_key) else {
                return 0;
            };
            for id in &ids {
                if let Some(task) = indices.by_id.remove(id) {
                    indices.by_deadline.remove(&(task.deadline_tick(), *id));
                }
            }
            ids.len()
        };

        debug!(removed, "Timeout tasks cancelled by object key");
        removed
    }

    /// Removes a single task.
    ///
    /// Returns false if the task is unknown, already fired or already removed.
    pub fn remove_by_task_id(&self, task_id: TaskId) -> bool {
        let removed = {
            let mut indices = self.indices.lock();
            match indices.by_id.remove(&task_id) {
                Some(task) => {
                    indices.by_deadline.remove(&(task.deadline_tick(), task_id));
                    indices.detach_from_key(task.object_key(), task_id);
                    true
                }
                None => false,
            }
        };

        if removed {
            debug!(task_id = %task_id, "Timeout task cancelled");
        }
        removed
    }

    /// Removes and returns every task due at `now_tick`.
    ///
    /// Tasks come back ordered by deadline, then by registration order. The
    /// whole drain happens under one lock hold, so a concurrent cancel either
    /// wins (the task is not returned) or loses (it becomes a no-op).
    pub fn drain_due(&self, now_tick: i64) -> Vec<TimeoutTask<K>> {
        let due = {
            let mut indices = self.indices.lock();
            let mut due = Vec::new();
            while let Some(&(deadline, task_id)) = indices.by_deadline.first() {
                if deadline > now_tick {
                    break;
                }
                indices.by_deadline.pop_first();
                if let Some(task) = indices.by_id.remove(&task_id) {
                    indices.detach_from_key(task.object_key(), task_id);
                    due.push(task);
                }
            }
            due
        };

        if !due.is_empty() {
            debug!(count = due.len(), now_tick, "Drained due timeout tasks");
        }
        due
    }

    /// Discards all pending tasks without firing them.
    pub fn clear(&self) -> usize {
        let mut indices = self.indices.lock();
        let discarded = indices.by_id.len();
        *indices = Indices::new();
        discarded
    }

    /// Returns the number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.lock().by_id.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the task is still pending.
    #[must_use]
    pub fn contains(&self, task_id: TaskId) -> bool {
        self.indices.lock().by_id.contains_key(&task_id)
    }

    /// Returns the ids pending for `object_key`, in registration order.
    #[must_use]
    pub fn pending_for(&self, object_key: &K) -> Vec<TaskId> {
        self.indices
            .lock()
            .by_key
            .get(object_key)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<i64> {
        self.indices
            .lock()
            .by_deadline
            .first()
            .map(|(deadline, _)| *deadline)
    }
}

impl<K> std::fmt::Debug for TimeoutRegistry<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutRegistry")
            .field("pending", &self.indices.lock().by_id.len())
            .field("last_task_id", &self.ids.last_issued())
            .finish_non_exhaustive()
    }
}
