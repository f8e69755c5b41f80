//! Recording callbacks.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Inner<K> {
    calls: Mutex<Vec<(K, Option<String>)>>,
    changed: Condvar,
}

/// Records every `(object_key, context)` a callback was invoked with.
///
/// Clones share the same record.
pub struct CallbackRecorder<K> {
    inner: Arc<Inner<K>>,
}

impl<K> Clone for CallbackRecorder<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K> Default for CallbackRecorder<K> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                calls: Mutex::new(Vec::new()),
                changed: Condvar::new(),
            }),
        }
    }
}

impl<K: Send + 'static> CallbackRecorder<K> {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a callback that appends to this recorder.
    pub fn callback(&self) -> impl FnOnce(K, Option<String>) + Send + 'static {
        let inner = self.inner.clone();
        move |key, context| {
            inner.calls.lock().push((key, context));
            inner.changed.notify_all();
        }
    }

    /// Returns the number of recorded invocations.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.calls.lock().len()
    }

    /// Blocks until at least `expected` invocations were recorded.
    ///
    /// Returns false if `timeout` elapsed first.
    pub fn wait_for_calls(&self, expected: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut calls = self.inner.calls.lock();
        while calls.len() < expected {
            if self.inner.changed.wait_until(&mut calls, deadline).timed_out() {
                return calls.len() >= expected;
            }
        }
        true
    }
}

impl<K: Clone + Send + 'static> CallbackRecorder<K> {
    /// Returns the recorded invocations in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<(K, Option<String>)> {
        self.inner.calls.lock().clone()
    }
}

impl<K> std::fmt::Debug for CallbackRecorder<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRecorder")
            .field("count", &self.inner.calls.lock().len())
            .finish()
    }
}
