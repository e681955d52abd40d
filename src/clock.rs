//! Injectable clock source
//!
//! All time-based circuit transitions compare monotonic timestamps on the
//! calling path; there is no timer thread. Injecting the clock makes every
//! transition deterministic under test.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Source of monotonic time for circuit breakers.
///
/// Timestamps are seconds relative to an arbitrary per-clock anchor; only
/// differences between two readings of the same clock are meaningful.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Get monotonic time in seconds (relative to the clock's creation)
    fn monotonic_time(&self) -> f64;
}

/// Production clock anchored to an [`Instant`] taken at creation.
///
/// Using a monotonic anchor rather than wall-clock time keeps open-wait
/// comparisons immune to NTP adjustments.
#[derive(Debug)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn monotonic_time(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock for deterministic tests.
///
/// Starts at zero and only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `step`.
    pub fn advance(&self, step: Duration) {
        *self.now.lock().unwrap() += step.as_secs_f64();
    }

    /// Set the clock to an absolute number of seconds.
    pub fn set(&self, seconds: f64) {
        *self.now.lock().unwrap() = seconds;
    }
}

impl Clock for ManualClock {
    fn monotonic_time(&self) -> f64 {
        *self.now.lock().unwrap()
    }
}
