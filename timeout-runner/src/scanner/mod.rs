//! Periodic expiry scanner.
//!
//! Every scan interval the scanner reads the clock, drains due tasks from the
//! registry and hands them to the dispatch queue. The registry lock is
//! released before the queue lock is taken.

use crate::clock::Clock;
use crate::dispatch::DispatchSender;
use crate::errors::{Result, RunnerError};
use crate::registry::TimeoutRegistry;
use crate::task::TimeoutTask;
use parking_lot::{Condvar, Mutex};
use std::hash::Hash;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Moves every task due at `now_tick` from `registry` to `sender`.
///
/// Returns the number of tasks handed off.
pub fn scan_once<K>(
    registry: &TimeoutRegistry<K>,
    sender: &DispatchSender<TimeoutTask<K>>,
    now_tick: i64,
) -> usize
where
    K: Eq + Hash + Clone + Send + 'static,
{
    let due = registry.drain_due(now_tick);
    let count = due.len();
    for task in due {
        sender.enqueue(task);
    }
    count
}

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    changed: Condvar,
}

impl StopSignal {
    /// Sleeps until `deadline`; returns true if stop was requested instead.
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.changed.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }

    fn raise(&self) {
        *self.stopped.lock() = true;
        self.changed.notify_all();
    }
}

/// Background thread that runs [`scan_once`] on a fixed period.
pub struct ExpiryScanner {
    signal: Arc<StopSignal>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ExpiryScanner {
    /// Spawns the scanner thread.
    ///
    /// Ticks are scheduled from the previous tick, so a slow scan does not
    /// shift later ones; ticks missed entirely are skipped.
    pub fn start<K>(
        registry: Arc<TimeoutRegistry<K>>,
        sender: DispatchSender<TimeoutTask<K>>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        thread_name: impl Into<String>,
    ) -> Result<Self>
    where
        K: Eq + Hash + Clone + Send + 'static,
    {
        let signal = Arc::new(StopSignal::default());
        let thread_signal = signal.clone();

        let handle = std::thread::Builder::new()
            .name(thread_name.into())
            .spawn(move || {
                debug!(interval_ms = interval.as_millis(), "Expiry scanner started");
                let mut next_tick = Instant::now() + interval;
                while !thread_signal.wait_until(next_tick) {
                    let now = Instant::now();
                    next_tick += interval;
                    if next_tick <= now {
                        trace!("Expiry scanner overran, skipping missed ticks");
                        next_tick = now + interval;
                    }

                    let now_tick = clock.now_seconds();
                    let moved = scan_once(&registry, &sender, now_tick);
                    if moved > 0 {
                        debug!(moved, now_tick, "Expired tasks queued for dispatch");
                    }
                }
                debug!("Expiry scanner exiting");
            })
            .map_err(RunnerError::WorkerSpawn)?;

        Ok(Self {
            signal,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Stops ticking and waits for an in-progress scan to finish.
    ///
    /// Calling `stop` again is a no-op.
    pub fn stop(&self) {
        self.signal.raise();
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!("Expiry scanner terminated abnormally");
            }
        }
    }

    /// Returns true until [`stop`](Self::stop) is called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }
}

impl Drop for ExpiryScanner {
    fn drop(&mut self) {
        self.signal.raise();
    }
}

impl std::fmt::Debug for ExpiryScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiryScanner")
            .field("running", &self.is_running())
            .finish()
    }
}
