//! Circuit breaker state machine
//!
//! One named circuit guards all calls to one upstream dependency. The
//! machine is driven entirely on the calling path: the OPEN → HALF_OPEN
//! transition is evaluated lazily against the injected clock when the next
//! permit is requested, never by a background timer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use state_machines::state_machine;
use thiserror::Error;

use crate::callbacks::Callbacks;
use crate::classify::ErrorCategory;
use crate::clock::{Clock, MonotonicClock};
use crate::probe::{ProbeGate, ProbeGuard};
use crate::window::{Outcome, SlidingWindow};

/// Immutable per-circuit configuration.
#[derive(Debug, Clone)]
pub struct CircuitProfile {
    /// Number of recent call outcomes the sliding window holds.
    pub window_size: usize,

    /// Failure rate (0.0-1.0) at or above which the circuit opens.
    pub failure_rate_threshold: f64,

    /// Minimum number of recorded outcomes before the rate is evaluated.
    pub minimum_calls: usize,

    /// How long the circuit stays open before probing is allowed.
    pub open_wait: Duration,

    /// Maximum number of concurrent half-open probe calls.
    pub probe_limit: usize,

    /// Whether business 4xx failures count toward the failure rate.
    /// Off by default: a client error is a caller mistake, not an
    /// infrastructure symptom.
    pub record_client_errors: bool,
}

impl Default for CircuitProfile {
    fn default() -> Self {
        Self {
            window_size: 100,
            failure_rate_threshold: 0.5,
            minimum_calls: 100,
            open_wait: Duration::from_secs(30),
            probe_limit: 3,
            record_client_errors: false,
        }
    }
}

impl CircuitProfile {
    /// Whether a failure of this category is recorded into the window.
    pub(crate) fn counts_toward_window(&self, category: &ErrorCategory) -> bool {
        match category {
            ErrorCategory::NetworkOrTimeout | ErrorCategory::ServerError(_) => true,
            ErrorCategory::BusinessClientError(_) => self.record_client_errors,
            // Rejections never reached the remote call.
            ErrorCategory::CircuitRejected => false,
        }
    }
}

/// Why a permit was refused. Both variants classify as `CircuitRejected`;
/// the remote call is never invoked for a refused attempt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    /// The circuit is open and the wait duration has not elapsed.
    #[error("circuit '{circuit}' is open (opened at {opened_at})")]
    Open { circuit: String, opened_at: f64 },

    /// The circuit is half-open and all probe slots are taken.
    #[error("circuit '{circuit}' half-open probe limit ({limit}) reached")]
    ProbeLimit { circuit: String, limit: usize },
}

/// Permission to perform one protected attempt.
///
/// Must be handed back through [`CircuitBreaker::on_success`] or
/// [`CircuitBreaker::on_failure`]; dropping it without either (a cancelled
/// attempt) records no outcome and frees any probe slot it held.
#[derive(Debug)]
pub struct CallPermit {
    probe: Option<ProbeGuard>,
}

impl CallPermit {
    /// Whether this permit admits a half-open probe call.
    pub fn is_probe(&self) -> bool {
        self.probe.is_some()
    }
}

/// Shared data available to the state machine's guards.
#[derive(Debug, Clone)]
pub struct BreakerContext {
    pub name: String,
    pub profile: CircuitProfile,
    pub window: Arc<SlidingWindow>,
    pub clock: Arc<dyn Clock>,
}

impl Default for BreakerContext {
    fn default() -> Self {
        let profile = CircuitProfile::default();
        Self {
            name: String::new(),
            window: Arc::new(SlidingWindow::new(profile.window_size)),
            clock: Arc::new(MonotonicClock::new()),
            profile,
        }
    }
}

/// Data specific to the Open state
#[derive(Debug, Clone, Default)]
pub struct OpenData {
    pub opened_at: f64,
}

/// Data specific to the HalfOpen state
#[derive(Debug, Clone, Default)]
pub struct HalfOpenData {
    pub successful_probes: usize,
}

// Circuit breaker lifecycle in dynamic mode: transitions are requested at
// call time and vetoed by guards when their condition does not hold.
state_machine! {
    name: Breaker,
    context: BreakerContext,
    dynamic: true,

    initial: Closed,
    states: [
        Closed,
        Open(OpenData),
        HalfOpen(HalfOpenData),
    ],
    events {
        trip {
            guards: [should_open],
            transition: { from: [Closed, HalfOpen], to: Open }
        }
        attempt_reset {
            guards: [timeout_elapsed],
            transition: { from: Open, to: HalfOpen }
        }
        close {
            guards: [should_close],
            transition: { from: HalfOpen, to: Closed }
        }
    }
}

impl Breaker<Closed> {
    /// The window's failure rate is only acted on after a full minimum
    /// sample; before that the circuit stays closed regardless of rate.
    fn should_open(&self, ctx: &BreakerContext) -> bool {
        ctx.window.recorded() >= ctx.profile.minimum_calls
            && ctx.window.failure_rate() >= ctx.profile.failure_rate_threshold
    }
}

impl Breaker<HalfOpen> {
    /// Any counted probe failure during recovery reopens immediately.
    fn should_open(&self, _ctx: &BreakerContext) -> bool {
        true
    }

    /// A successful deciding probe closes the circuit.
    fn should_close(&self, _ctx: &BreakerContext) -> bool {
        let data = self
            .state_data_half_open()
            .expect("HalfOpen state must have data");
        data.successful_probes >= 1
    }
}

impl Breaker<Open> {
    fn timeout_elapsed(&self, ctx: &BreakerContext) -> bool {
        let data = self.state_data_open().expect("Open state must have data");
        let elapsed = ctx.clock.monotonic_time() - data.opened_at;
        elapsed >= ctx.profile.open_wait.as_secs_f64()
    }
}

/// Circuit breaker public API.
///
/// Shared by arbitrarily many concurrent callers; all state decisions happen
/// under a single internal mutex so state and window updates are
/// linearizable with respect to `try_acquire` / `on_success` / `on_failure`.
#[derive(Debug)]
pub struct CircuitBreaker {
    context: BreakerContext,
    machine: Mutex<DynamicBreaker>,
    probes: Arc<ProbeGate>,
    callbacks: Callbacks,
}

impl CircuitBreaker {
    /// Create a circuit with the given profile (use `builder()` for hooks
    /// and a custom clock).
    pub fn new(name: impl Into<String>, profile: CircuitProfile) -> Self {
        let context = BreakerContext {
            name: name.into(),
            window: Arc::new(SlidingWindow::new(profile.window_size)),
            clock: Arc::new(MonotonicClock::new()),
            profile,
        };
        Self::with_parts(context, Callbacks::new())
    }

    pub(crate) fn with_parts(context: BreakerContext, callbacks: Callbacks) -> Self {
        let probes = Arc::new(ProbeGate::new(context.profile.probe_limit));
        let machine = Mutex::new(DynamicBreaker::new(context.clone()));
        Self {
            context,
            machine,
            probes,
            callbacks,
        }
    }

    /// Create a new circuit breaker builder.
    pub fn builder(name: impl Into<String>) -> crate::builder::CircuitBuilder {
        crate::builder::CircuitBuilder::new(name)
    }

    /// Ask for permission to perform one attempt.
    ///
    /// Evaluates the lazy OPEN → HALF_OPEN transition first, then either
    /// hands out a permit (a probe permit while half-open) or rejects. A
    /// rejection is terminal for the attempt: it is classified as
    /// `CircuitRejected` and the remote call must not be made.
    pub fn try_acquire(&self) -> Result<CallPermit, Rejection> {
        let mut machine = self.machine.lock().unwrap();

        let mut went_half_open = false;
        if machine.current_state() == "Open" {
            let _ = machine.handle(BreakerEvent::AttemptReset);
            went_half_open = machine.current_state() == "HalfOpen";
        }

        let outcome = match machine.current_state() {
            "Open" => {
                let opened_at = machine.open_data().map(|d| d.opened_at).unwrap_or(0.0);
                Err(Rejection::Open {
                    circuit: self.context.name.clone(),
                    opened_at,
                })
            }
            "HalfOpen" => match self.probes.try_acquire() {
                Some(guard) => Ok(CallPermit { probe: Some(guard) }),
                None => Err(Rejection::ProbeLimit {
                    circuit: self.context.name.clone(),
                    limit: self.probes.limit(),
                }),
            },
            _ => Ok(CallPermit { probe: None }),
        };
        drop(machine);

        if went_half_open {
            tracing::info!(circuit = %self.context.name, "circuit half-open, probing upstream");
            self.callbacks.notify_half_open(&self.context.name);
        }
        outcome
    }

    /// Report a successful attempt.
    ///
    /// A successful probe closes the circuit and resets the window; any
    /// other success is recorded as an outcome.
    pub fn on_success(&self, permit: CallPermit) {
        let mut machine = self.machine.lock().unwrap();

        let mut closed = false;
        if machine.current_state() == "HalfOpen" && permit.is_probe() {
            if let Some(data) = machine.half_open_data_mut() {
                data.successful_probes += 1;
            }
            if machine.handle(BreakerEvent::Close).is_ok() {
                self.context.window.reset();
                closed = true;
            }
        } else {
            self.context.window.record(Outcome::Success);
        }
        drop(machine);

        if closed {
            tracing::info!(circuit = %self.context.name, "circuit closed after successful probe");
            self.callbacks.notify_close(&self.context.name);
        }
    }

    /// Report a failed attempt with its classified category.
    ///
    /// Categories that do not count toward the window (business 4xx by
    /// default, rejections always) leave the circuit untouched; for a
    /// probe, a 4xx proves connectivity and is not a deciding probe. A
    /// counted probe failure while half-open reopens the circuit; while
    /// closed it is recorded and the rate threshold re-evaluated. A failure
    /// on a permit issued before the circuit opened is stale by the time the
    /// circuit is half-open: it belongs to the outage already being probed
    /// and must not decide the recovery, so it is discarded.
    pub fn on_failure(&self, permit: CallPermit, category: &ErrorCategory) {
        if !self.context.profile.counts_toward_window(category) {
            drop(permit);
            return;
        }

        let mut machine = self.machine.lock().unwrap();

        let mut opened = false;
        if machine.current_state() == "HalfOpen" {
            // Only a probe permit may settle the half-open state.
            if !permit.is_probe() {
                return;
            }
            if machine.handle(BreakerEvent::Trip).is_ok() {
                self.context.window.reset();
                self.stamp_open(&mut machine);
                opened = true;
            }
        } else {
            self.context.window.record(Outcome::Failure);
            if machine.handle(BreakerEvent::Trip).is_ok() {
                self.stamp_open(&mut machine);
                opened = true;
            }
        }
        drop(machine);

        if opened {
            tracing::warn!(circuit = %self.context.name, "circuit opened");
            self.callbacks.notify_open(&self.context.name);
        }
    }

    /// Circuit name.
    pub fn name(&self) -> &str {
        &self.context.name
    }

    /// Current state name ("Closed", "Open" or "HalfOpen").
    pub fn state_name(&self) -> &'static str {
        self.machine.lock().unwrap().current_state()
    }

    pub fn is_closed(&self) -> bool {
        self.state_name() == "Closed"
    }

    pub fn is_open(&self) -> bool {
        self.state_name() == "Open"
    }

    pub fn is_half_open(&self) -> bool {
        self.state_name() == "HalfOpen"
    }

    /// Clear the window and return to Closed, as after a process restart.
    pub fn reset(&self) {
        let mut machine = self.machine.lock().unwrap();
        self.context.window.reset();
        *machine = DynamicBreaker::new(self.context.clone());
    }

    pub(crate) fn window(&self) -> &SlidingWindow {
        &self.context.window
    }

    /// Record when the circuit opened; the open-wait is measured from here.
    fn stamp_open(&self, machine: &mut DynamicBreaker) {
        if let Some(data) = machine.open_data_mut() {
            data.opened_at = self.context.clock.monotonic_time();
        }
    }
}
