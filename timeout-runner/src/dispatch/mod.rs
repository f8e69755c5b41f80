//! Serial callback dispatch.
//!
//! This module provides:
//! - `Dispatch`, the payload contract of the dispatch worker
//! - `DispatchQueue`, a FIFO drained by one dedicated thread
//! - `QueueTaskRunner`, the queue on its own for callers without timeouts

mod metrics;
mod queue;
mod queue_runner;

pub use metrics::DispatchMetrics;
pub use queue::{DispatchQueue, DispatchSender};
pub use queue_runner::QueueTaskRunner;

use crate::task::TaskId;

/// A unit of work executed by the dispatch worker.
pub trait Dispatch: Send + 'static {
    /// Consumes the item and runs its callback.
    fn dispatch(self);

    /// Returns the id of the timeout task, if the item has one.
    fn task_id(&self) -> Option<TaskId> {
        None
    }
}
