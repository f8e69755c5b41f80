//! Single-consumer dispatch queue backed by a dedicated thread.

use super::{Dispatch, DispatchMetrics};
use crate::config::RunnerConfig;
use crate::diagnostics::ElapsedTimer;
use crate::errors::{Result, RunnerError};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

struct QueueState<T> {
    items: VecDeque<T>,
    /// Cleared by `stop`; the worker exits once it sees this.
    working: bool,
    /// Set by the worker as its last action.
    exited: bool,
}

struct Shared<T> {
    state: Mutex<QueueState<T>>,
    /// Signalled on enqueue and on stop.
    wakeup: Condvar,
    /// Signalled when the worker exits.
    exited: Condvar,
    metrics: DispatchMetrics,
}

impl<T: Dispatch> Shared<T> {
    fn push(&self, item: T) -> bool {
        {
            let mut state = self.state.lock();
            if !state.working {
                drop(state);
                self.metrics.record_dropped(1);
                debug!("Dispatch queue stopped, item dropped");
                return false;
            }
            state.items.push_back(item);
        }
        self.metrics.record_enqueued();
        self.wakeup.notify_one();
        true
    }

    /// Blocks until an item is available or the queue is stopped.
    fn next_item(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if !state.working {
                return None;
            }
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            self.wakeup.wait(&mut state);
        }
    }

    fn run(&self, item: T) {
        let task_id = item.task_id();
        let timer = ElapsedTimer::new();

        match catch_unwind(AssertUnwindSafe(move || item.dispatch())) {
            Ok(()) => {
                self.metrics.record_completed();
                debug!(task_id = ?task_id, elapsed_ms = timer.over(), "Callback completed");
            }
            Err(panic) => {
                self.metrics.record_failed();
                error!(
                    task_id = ?task_id,
                    elapsed_ms = timer.over(),
                    panic = %panic_message(panic.as_ref()),
                    "Callback panicked"
                );
            }
        }
    }
}

/// Marks the worker as exited when dropped, including on unwind.
struct ExitGuard<'a, T>(&'a Shared<T>);

impl<T> Drop for ExitGuard<'_, T> {
    fn drop(&mut self) {
        self.0.state.lock().exited = true;
        self.0.exited.notify_all();
    }
}

fn worker_loop<T: Dispatch>(shared: &Shared<T>) {
    let _guard = ExitGuard(shared);
    debug!("Dispatch worker started");
    while let Some(item) = shared.next_item() {
        shared.run(item);
    }
    debug!("Dispatch worker exiting");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// Cloneable producer handle for a [`DispatchQueue`].
pub struct DispatchSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for DispatchSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Dispatch> DispatchSender<T> {
    /// Appends an item and wakes the worker.
    ///
    /// Returns false if the queue has been stopped; the item is dropped.
    pub fn enqueue(&self, item: T) -> bool {
        self.shared.push(item)
    }
}

impl<T> std::fmt::Debug for DispatchSender<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchSender").finish_non_exhaustive()
    }
}

/// Ordered, single-threaded executor for [`Dispatch`] items.
///
/// Items run one at a time in enqueue order on one worker thread. The worker
/// sleeps on a condition variable while the queue is empty. A panicking item
/// is logged and counted; the worker carries on with the next one.
pub struct DispatchQueue<T> {
    shared: Arc<Shared<T>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
    thread_name: String,
    shutdown_timeout: Duration,
}

impl<T: Dispatch> DispatchQueue<T> {
    /// Creates a queue without starting its worker.
    #[must_use]
    pub fn new(config: &RunnerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    items: VecDeque::new(),
                    working: true,
                    exited: false,
                }),
                wakeup: Condvar::new(),
                exited: Condvar::new(),
                metrics: DispatchMetrics::default(),
            }),
            worker: Mutex::new(None),
            started: AtomicBool::new(false),
            thread_name: format!("{}-dispatch", config.thread_name),
            shutdown_timeout: config.shutdown_timeout(),
        }
    }

    /// Creates a queue and starts its worker.
    pub fn started(config: &RunnerConfig) -> Result<Self> {
        let queue = Self::new(config);
        queue.start()?;
        Ok(queue)
    }

    /// Spawns the worker thread.
    ///
    /// May only be called once; items enqueued earlier are run once it starts.
    pub fn start(&self) -> Result<()> {
        if !self.shared.state.lock().working {
            return Err(RunnerError::Stopped);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(RunnerError::AlreadyStarted);
        }

        let shared = self.shared.clone();
        let spawned = std::thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || worker_loop(&shared));

        match spawned {
            Ok(handle) => {
                *self.worker.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.started.store(false, Ordering::SeqCst);
                Err(RunnerError::WorkerSpawn(e))
            }
        }
    }

    /// Appends an item and wakes the worker. Never waits on the worker.
    ///
    /// Returns false if the queue has been stopped; the item is dropped.
    pub fn enqueue(&self, item: T) -> bool {
        self.shared.push(item)
    }

    /// Returns a producer handle that can be moved to other threads.
    #[must_use]
    pub fn sender(&self) -> DispatchSender<T> {
        DispatchSender {
            shared: self.shared.clone(),
        }
    }

    /// Stops the worker after its in-progress item and discards the rest.
    ///
    /// Waits at most the configured shutdown timeout. Returns false if the
    /// worker did not exit in time; it is then detached and finishes on its
    /// own. Calling `stop` again is a no-op.
    pub fn stop(&self) -> bool {
        let handle = self.worker.lock().take();

        let (discarded, exited) = {
            let mut state = self.shared.state.lock();
            state.working = false;
            self.shared.wakeup.notify_all();

            let mut exited = true;
            if handle.is_some() {
                let deadline = Instant::now() + self.shutdown_timeout;
                while !state.exited {
                    if self
                        .shared
                        .exited
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        exited = state.exited;
                        break;
                    }
                }
            }
            (std::mem::take(&mut state.items), exited)
        };

        if !discarded.is_empty() {
            self.shared.metrics.record_dropped(discarded.len() as u64);
            debug!(discarded = discarded.len(), "Discarded queued items at stop");
        }
        drop(discarded);

        let Some(handle) = handle else {
            return true;
        };
        if exited {
            if handle.join().is_err() {
                warn!(thread = %self.thread_name, "Dispatch worker terminated abnormally");
            }
            true
        } else {
            warn!(
                thread = %self.thread_name,
                timeout_ms = self.shutdown_timeout.as_millis(),
                "Dispatch worker did not stop in time, detaching"
            );
            false
        }
    }

    /// Returns the number of items waiting to run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    /// Returns true if no items are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true while the worker is started and not stopped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && self.shared.state.lock().working
    }

    /// Returns the queue metrics.
    #[must_use]
    pub fn metrics(&self) -> &DispatchMetrics {
        &self.shared.metrics
    }
}

impl<T> Drop for DispatchQueue<T> {
    fn drop(&mut self) {
        let handle = self.worker.get_mut().take();
        self.shared.state.lock().working = false;
        self.shared.wakeup.notify_all();
        // Detached; the worker exits after its in-progress item.
        drop(handle);
    }
}

impl<T> std::fmt::Debug for DispatchQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("thread_name", &self.thread_name)
            .field("queued", &self.shared.state.lock().items.len())
            .field("started", &self.started.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
