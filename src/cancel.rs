//! Cooperative cancellation token

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Clonable flag a caller can raise to stop an in-progress operation.
///
/// The retry executor checks the token before scheduling each attempt; a
/// cancelled operation propagates as `Cancelled` rather than as a classified
/// failure. Cancellation does not interrupt a remote call already in flight;
/// that call's own timeout surfaces as a network failure instead.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
