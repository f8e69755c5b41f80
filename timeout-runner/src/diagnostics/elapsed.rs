//! Stopwatch for measuring elapsed time.

use std::time::{Duration, Instant};

/// Measures time since construction or the last [`start`](Self::start).
#[derive(Debug, Clone, Copy)]
pub struct ElapsedTimer {
    started_at: Instant,
}

impl Default for ElapsedTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl ElapsedTimer {
    /// Creates a timer that is already running.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    /// Restarts the timer.
    pub fn start(&mut self) {
        self.started_at = Instant::now();
    }

    /// Returns the elapsed time in whole milliseconds.
    #[must_use]
    pub fn over(&self) -> u64 {
        u64::try_from(self.span().as_millis()).unwrap_or(u64::MAX)
    }

    /// Returns the elapsed time.
    #[must_use]
    pub fn span(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Runs `action` and returns how long it took.
    pub fn elapsed<F: FnOnce()>(action: F) -> Duration {
        let timer = Self::new();
        action();
        timer.span()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_runs_from_construction() {
        let timer = ElapsedTimer::new();
        std::thread::sleep(Duration::from_millis(15));
        assert!(timer.over() >= 15);
        assert!(timer.span() >= Duration::from_millis(15));
    }

    #[test]
    fn test_start_resets() {
        let mut timer = ElapsedTimer::new();
        std::thread::sleep(Duration::from_millis(30));
        timer.start();
        assert!(timer.span() < Duration::from_millis(30));
    }

    #[test]
    fn test_elapsed_measures_action() {
        let mut ran = false;
        let took = ElapsedTimer::elapsed(|| {
            std::thread::sleep(Duration::from_millis(10));
            ran = true;
        });
        assert!(ran);
        assert!(took >= Duration::from_millis(10));
    }
}
