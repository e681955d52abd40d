//! Builders for circuits and the orchestrator

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::callbacks::Callbacks;
use crate::circuit::{BreakerContext, CircuitBreaker, CircuitProfile};
use crate::clock::{Clock, MonotonicClock};
use crate::registry::{OperationProfile, Orchestrator};
use crate::window::SlidingWindow;

/// Fluent construction of a [`CircuitBreaker`].
///
/// ```
/// use guardrail::CircuitBreaker;
/// use std::time::Duration;
///
/// let circuit = CircuitBreaker::builder("catalog")
///     .window_size(50)
///     .failure_rate_threshold(0.6)
///     .open_wait(Duration::from_secs(15))
///     .build();
/// assert!(circuit.is_closed());
/// ```
pub struct CircuitBuilder {
    name: String,
    profile: CircuitProfile,
    clock: Option<Arc<dyn Clock>>,
    callbacks: Callbacks,
}

impl CircuitBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            profile: CircuitProfile::default(),
            clock: None,
            callbacks: Callbacks::new(),
        }
    }

    /// Replace the whole profile at once.
    pub fn profile(mut self, profile: CircuitProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn window_size(mut self, size: usize) -> Self {
        self.profile.window_size = size;
        self
    }

    /// Clamped to 0.0-1.0.
    pub fn failure_rate_threshold(mut self, threshold: f64) -> Self {
        self.profile.failure_rate_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn minimum_calls(mut self, calls: usize) -> Self {
        self.profile.minimum_calls = calls;
        self
    }

    pub fn open_wait(mut self, wait: Duration) -> Self {
        self.profile.open_wait = wait;
        self
    }

    pub fn probe_limit(mut self, limit: usize) -> Self {
        self.profile.probe_limit = limit;
        self
    }

    pub fn record_client_errors(mut self, record: bool) -> Self {
        self.profile.record_client_errors = record;
        self
    }

    /// Inject a clock. Tests use this with a manually advanced clock; by
    /// default the circuit reads process-monotonic time.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn on_open<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_open = Some(Arc::new(hook));
        self
    }

    pub fn on_close<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_close = Some(Arc::new(hook));
        self
    }

    pub fn on_half_open<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_half_open = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> CircuitBreaker {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let context = BreakerContext {
            name: self.name,
            window: Arc::new(SlidingWindow::new(self.profile.window_size)),
            clock,
            profile: self.profile,
        };
        CircuitBreaker::with_parts(context, self.callbacks)
    }
}

/// Fluent construction of an [`Orchestrator`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    profiles: HashMap<String, OperationProfile>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation. Re-registering a name replaces the previous
    /// profile.
    pub fn operation(mut self, name: impl Into<String>, profile: OperationProfile) -> Self {
        self.profiles.insert(name.into(), profile);
        self
    }

    pub fn build(self) -> Orchestrator {
        Orchestrator::from_profiles(self.profiles)
    }
}
