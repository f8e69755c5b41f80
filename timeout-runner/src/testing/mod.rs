//! Testing utilities for code built on the runners.
//!
//! This module provides:
//! - `CallbackRecorder`, which records callback invocations and can wait for them
//! - `ManualClock`, re-exported for deterministic deadlines

mod recorder;

pub use crate::clock::ManualClock;
pub use recorder::CallbackRecorder;
