//! Execution pipeline
//!
//! Composes the retry executor and the circuit breaker around one
//! caller-supplied remote call. Two orderings exist and stay distinct
//! configuration because they react differently under sustained failure:
//! with the circuit outside, one logical operation contributes a single
//! outcome to the window no matter how often it retried inside; with retry
//! outside, every attempt passes the breaker individually and contributes
//! its own outcome, opening the circuit faster for the same failure rate.

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::circuit::CircuitBreaker;
use crate::classify::ClassifiedFailure;
use crate::errors::RemoteFailure;
use crate::retry::{self, RetryProfile};

/// Where the circuit breaker sits relative to the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositionOrder {
    /// The breaker gates the whole retry sequence; an open circuit
    /// suppresses every retry. This is the default.
    #[default]
    CircuitOuter,
    /// Every retry attempt acquires its own permit and records its own
    /// outcome.
    RetryOuter,
}

/// Failure flowing between pipeline stages. Only the `execute` boundary
/// converts this into a caller-visible domain error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    Failure(ClassifiedFailure),
    Cancelled,
}

/// Run one protected logical operation.
pub(crate) fn run<T, F>(
    circuit: &CircuitBreaker,
    retry: &RetryProfile,
    order: CompositionOrder,
    cancel: &CancelToken,
    call: &mut F,
) -> Result<T, PipelineError>
where
    F: FnMut() -> Result<T, RemoteFailure>,
{
    match order {
        CompositionOrder::CircuitOuter => circuit_outer(circuit, retry, cancel, call),
        CompositionOrder::RetryOuter => retry_outer(circuit, retry, cancel, call),
    }
}

/// One permit around the whole retry sequence; one recorded outcome per
/// logical operation.
fn circuit_outer<T, F>(
    circuit: &CircuitBreaker,
    retry: &RetryProfile,
    cancel: &CancelToken,
    call: &mut F,
) -> Result<T, PipelineError>
where
    F: FnMut() -> Result<T, RemoteFailure>,
{
    let permit = match circuit.try_acquire() {
        Ok(permit) => permit,
        Err(rejection) => {
            tracing::debug!(circuit = circuit.name(), %rejection, "call rejected");
            return Err(PipelineError::Failure(ClassifiedFailure::rejected()));
        }
    };

    let outcome = retry::run_attempts(retry, cancel, |_| {
        call().map_err(|failure| PipelineError::Failure(ClassifiedFailure::from_remote(failure)))
    });

    match outcome {
        Ok(value) => {
            circuit.on_success(permit);
            Ok(value)
        }
        Err(PipelineError::Failure(failure)) => {
            circuit.on_failure(permit, &failure.category);
            Err(PipelineError::Failure(failure))
        }
        Err(PipelineError::Cancelled) => {
            // No outcome for a cancelled operation; the permit just lapses.
            drop(permit);
            Err(PipelineError::Cancelled)
        }
    }
}

/// Each attempt individually passes the breaker; a rejection mid-sequence
/// is not retryable and ends the operation.
fn retry_outer<T, F>(
    circuit: &CircuitBreaker,
    retry: &RetryProfile,
    cancel: &CancelToken,
    call: &mut F,
) -> Result<T, PipelineError>
where
    F: FnMut() -> Result<T, RemoteFailure>,
{
    retry::run_attempts(retry, cancel, |_| {
        let permit = match circuit.try_acquire() {
            Ok(permit) => permit,
            Err(rejection) => {
                tracing::debug!(circuit = circuit.name(), %rejection, "attempt rejected");
                return Err(PipelineError::Failure(ClassifiedFailure::rejected()));
            }
        };

        match call() {
            Ok(value) => {
                circuit.on_success(permit);
                Ok(value)
            }
            Err(raw) => {
                let failure = ClassifiedFailure::from_remote(raw);
                circuit.on_failure(permit, &failure.category);
                Err(PipelineError::Failure(failure))
            }
        }
    })
}
