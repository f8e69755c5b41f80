//! Diagnostics helpers.

mod elapsed;

pub use elapsed::ElapsedTimer;
