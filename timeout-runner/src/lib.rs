//! # timeout-runner
//!
//! Second-granularity timeout scheduling for in-process callers.
//!
//! Callers register an object key, a timeout in seconds and a callback. Once
//! the timeout elapses the callback fires exactly once, unless the task was
//! cancelled first, either by its task id or by object key.
//!
//! - **Registry**: pending tasks indexed by id, object key and deadline under one lock
//! - **Expiry scanner**: a thread that drains due tasks once per second
//! - **Dispatch queue**: one worker thread running callbacks in FIFO order,
//!   isolated from panics
//! - **Queue runner**: the dispatch queue on its own, for ordered callbacks
//!   without timeouts
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use timeout_runner::prelude::*;
//!
//! # fn main() -> timeout_runner::errors::Result<()> {
//! let runner = TimeoutTaskRunner::new()?;
//!
//! let id = runner.add_with_context("session-17".to_string(), 30, |key, context| {
//!     println!("{key} idle, context {context:?}");
//! }, "login");
//!
//! // Activity seen: cancel and re-arm.
//! runner.remove_by_task_id(id);
//! runner.add("session-17".to_string(), 30, |key, _| println!("{key} idle"));
//!
//! runner.stop();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod clock;
pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod errors;
pub mod observability;
pub mod registry;
pub mod runner;
pub mod scanner;
pub mod task;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::RunnerConfig;
    pub use crate::diagnostics::ElapsedTimer;
    pub use crate::dispatch::{Dispatch, DispatchMetrics, DispatchQueue, QueueTaskRunner};
    pub use crate::errors::{Result, RunnerError};
    pub use crate::observability::{init_logging, LogFormat};
    pub use crate::registry::TimeoutRegistry;
    pub use crate::runner::TimeoutTaskRunner;
    pub use crate::task::{QueueTask, TaskId, TimeoutTask};
}
