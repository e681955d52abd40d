//! Count-based sliding window of call outcomes
//!
//! A fixed-capacity ring of the most recent outcomes per circuit. Once full,
//! each new outcome overwrites the oldest entry. The failure counter is
//! maintained incrementally so `failure_rate()` never walks the ring.

use std::sync::RwLock;

/// The result of one completed remote-call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug)]
struct Ring {
    slots: Vec<Outcome>,
    cursor: usize,
    failures: usize,
}

/// Thread-safe fixed-capacity outcome buffer.
///
/// Writers and readers go through an internal lock, so an outcome is either
/// fully counted or not yet counted; a reader can never observe a
/// half-applied record.
#[derive(Debug)]
pub struct SlidingWindow {
    capacity: usize,
    ring: RwLock<Ring>,
}

impl SlidingWindow {
    /// Create a window holding at most `capacity` outcomes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be greater than 0");
        Self {
            capacity,
            ring: RwLock::new(Ring {
                slots: Vec::with_capacity(capacity),
                cursor: 0,
                failures: 0,
            }),
        }
    }

    /// Append an outcome, evicting the oldest entry once the window is full.
    pub fn record(&self, outcome: Outcome) {
        let mut ring = self.ring.write().unwrap();

        if ring.slots.len() < self.capacity {
            ring.slots.push(outcome);
        } else {
            let cursor = ring.cursor;
            let evicted = std::mem::replace(&mut ring.slots[cursor], outcome);
            if evicted == Outcome::Failure {
                ring.failures -= 1;
            }
        }

        if outcome == Outcome::Failure {
            ring.failures += 1;
        }
        ring.cursor = (ring.cursor + 1) % self.capacity;
    }

    /// Fraction of failures among currently held outcomes.
    ///
    /// An empty window reports 0.0; whether enough samples were seen to act
    /// on the rate is the circuit's decision, not the window's.
    pub fn failure_rate(&self) -> f64 {
        let ring = self.ring.read().unwrap();
        if ring.slots.is_empty() {
            0.0
        } else {
            ring.failures as f64 / ring.slots.len() as f64
        }
    }

    /// Number of outcomes currently held.
    pub fn recorded(&self) -> usize {
        self.ring.read().unwrap().slots.len()
    }

    /// Number of failure outcomes currently held.
    pub fn failures(&self) -> usize {
        self.ring.read().unwrap().failures
    }

    /// Maximum number of outcomes the window can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every recorded outcome.
    pub fn reset(&self) {
        let mut ring = self.ring.write().unwrap();
        ring.slots.clear();
        ring.cursor = 0;
        ring.failures = 0;
    }
}
