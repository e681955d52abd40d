//! Half-open probe admission gate
//!
//! While a circuit is half-open, only a bounded number of trial calls may be
//! in flight at once. The gate is a lock-free counting semaphore: two callers
//! racing for the last slot can never both win, and extra arrivals are turned
//! away immediately rather than queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Atomically bounded admission gate for half-open probe calls.
#[derive(Debug)]
pub struct ProbeGate {
    limit: usize,
    in_flight: AtomicUsize,
}

impl ProbeGate {
    /// Create a gate admitting at most `limit` concurrent probes.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is 0.
    pub fn new(limit: usize) -> Self {
        assert!(limit > 0, "probe limit must be greater than 0");
        Self {
            limit,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Claim a probe slot without blocking.
    ///
    /// Returns `None` when all slots are taken. The returned guard gives the
    /// slot back when dropped, including on panic.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ProbeGuard> {
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |held| {
                (held < self.limit).then_some(held + 1)
            })
            .ok()
            .map(|_| ProbeGuard {
                gate: Arc::clone(self),
            })
    }

    /// Maximum number of concurrent probes.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of probe slots currently claimed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    fn release(&self) {
        self.in_flight.fetch_sub(1, Ordering::Release);
    }
}

/// RAII handle for one admitted probe; releases its slot on drop.
#[derive(Debug)]
pub struct ProbeGuard {
    gate: Arc<ProbeGate>,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.gate.release();
    }
}
