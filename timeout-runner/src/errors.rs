//! Error types for the timeout runner.
//!
//! Steady-state operations (registering, cancelling, enqueueing) never fail:
//! cancelling an unknown task is a no-op and callback panics are contained in
//! the dispatch worker. The errors here only cover configuration and the
//! lifecycle of the background threads.

use thiserror::Error;

/// The main error type for timeout runner operations.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The supplied configuration was rejected.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A background thread could not be spawned.
    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// The component was already started.
    #[error("Worker already started")]
    AlreadyStarted,

    /// The component was stopped and cannot be restarted.
    #[error("Worker has been stopped")]
    Stopped,
}

impl RunnerError {
    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Returns true if the error is caused by a lifecycle misuse.
    #[must_use]
    pub const fn is_lifecycle(&self) -> bool {
        matches!(self, Self::AlreadyStarted | Self::Stopped)
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, RunnerError>;
