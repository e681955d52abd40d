//! Bounded retry execution
//!
//! Re-invokes an attempt up to a fixed number of times with a fixed delay in
//! between. Whether a failure is worth retrying is decided purely by its
//! classified category; business errors and circuit rejections stop the
//! sequence immediately. The inter-attempt sleep blocks only the calling
//! thread and never holds a circuit lock.

use std::time::Duration;

use crate::cancel::CancelToken;
use crate::classify::{CategoryKind, ErrorCategory};
use crate::pipeline::PipelineError;

/// Immutable retry configuration for one logical operation.
#[derive(Debug, Clone)]
pub struct RetryProfile {
    /// Total invocations: 1 initial attempt plus up to `max_attempts - 1`
    /// retries. Values below 1 are treated as 1.
    pub max_attempts: u32,

    /// Fixed delay between attempts.
    pub delay: Duration,

    /// Categories worth retrying. By convention only transient
    /// infrastructure categories belong here.
    pub retryable: Vec<CategoryKind>,

    /// Jitter factor (0.0 = none) applied to the delay using the
    /// chrono-machines formula: delay * (1 - jitter + rand * jitter).
    pub jitter_factor: f64,
}

impl Default for RetryProfile {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
            retryable: vec![CategoryKind::NetworkOrTimeout],
            jitter_factor: 0.0,
        }
    }
}

impl RetryProfile {
    /// A profile that never retries.
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Whether a failure of this category may be retried.
    pub fn is_retryable(&self, category: &ErrorCategory) -> bool {
        self.retryable.contains(&category.kind())
    }

    /// Delay before the next attempt, with jitter applied if configured.
    fn next_delay(&self) -> Duration {
        if self.jitter_factor <= 0.0 {
            return self.delay;
        }
        let base_ms = self.delay.as_millis() as u64;
        let policy = chrono_machines::Policy {
            max_attempts: 1,
            base_delay_ms: base_ms,
            multiplier: 1.0,
            max_delay_ms: base_ms,
        };
        Duration::from_millis(policy.calculate_delay(1, self.jitter_factor) as u64)
    }
}

/// Drive `attempt` until it succeeds, fails unretryably, exhausts the
/// attempt budget, or the caller cancels.
///
/// `attempt` receives the 1-based attempt number. Cancellation is checked
/// before every attempt and propagated as-is, never classified.
pub(crate) fn run_attempts<T, F>(
    profile: &RetryProfile,
    cancel: &CancelToken,
    mut attempt: F,
) -> Result<T, PipelineError>
where
    F: FnMut(u32) -> Result<T, PipelineError>,
{
    let budget = profile.max_attempts.max(1);
    let mut attempt_no = 1;

    loop {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        match attempt(attempt_no) {
            Ok(value) => return Ok(value),
            Err(PipelineError::Cancelled) => return Err(PipelineError::Cancelled),
            Err(PipelineError::Failure(failure)) => {
                if attempt_no >= budget || !profile.is_retryable(&failure.category) {
                    return Err(PipelineError::Failure(failure));
                }
                // A caller that cancelled during the attempt must not be
                // held through the inter-attempt delay.
                if cancel.is_cancelled() {
                    return Err(PipelineError::Cancelled);
                }
                let delay = profile.next_delay();
                tracing::debug!(
                    attempt = attempt_no,
                    category = ?failure.category,
                    delay_ms = delay.as_millis() as u64,
                    "attempt failed, retrying"
                );
                std::thread::sleep(delay);
                attempt_no += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassifiedFailure;
    use crate::errors::RemoteFailure;

    fn quick_profile(max_attempts: u32) -> RetryProfile {
        RetryProfile {
            max_attempts,
            delay: Duration::ZERO,
            retryable: vec![CategoryKind::NetworkOrTimeout, CategoryKind::ServerError],
            jitter_factor: 0.0,
        }
    }

    fn network_failure() -> PipelineError {
        PipelineError::Failure(ClassifiedFailure::from_remote(RemoteFailure::network(
            "connection reset",
        )))
    }

    #[test]
    fn test_success_on_first_attempt_makes_one_call() {
        let mut calls = 0;
        let result: Result<i32, _> =
            run_attempts(&quick_profile(3), &CancelToken::new(), |_| {
                calls += 1;
                Ok(7)
            });

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_exhausts_exactly_max_attempts() {
        let mut calls = 0;
        let result: Result<(), _> =
            run_attempts(&quick_profile(3), &CancelToken::new(), |_| {
                calls += 1;
                Err(network_failure())
            });

        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_recovers_on_later_attempt() {
        let mut calls = 0;
        let result = run_attempts(&quick_profile(3), &CancelToken::new(), |attempt| {
            calls += 1;
            if attempt < 3 {
                Err(network_failure())
            } else {
                Ok("recovered")
            }
        });

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_non_retryable_category_stops_immediately() {
        let mut calls = 0;
        let result: Result<(), _> =
            run_attempts(&quick_profile(5), &CancelToken::new(), |_| {
                calls += 1;
                Err(PipelineError::Failure(ClassifiedFailure::from_remote(
                    RemoteFailure::http(409),
                )))
            });

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_circuit_rejection_is_never_retried_by_default() {
        let mut calls = 0;
        let result: Result<(), _> =
            run_attempts(&quick_profile(5), &CancelToken::new(), |_| {
                calls += 1;
                Err(PipelineError::Failure(ClassifiedFailure::rejected()))
            });

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_propagates_last_failure_on_exhaustion() {
        let result: Result<(), _> =
            run_attempts(&quick_profile(2), &CancelToken::new(), |attempt| {
                Err(PipelineError::Failure(ClassifiedFailure::from_remote(
                    RemoteFailure::http(500 + attempt as u16),
                )))
            });

        match result {
            Err(PipelineError::Failure(f)) => {
                assert_eq!(f.failure, Some(RemoteFailure::http(502)));
            }
            other => panic!("expected classified failure, got {other:?}"),
        }
    }

    #[test]
    fn test_pre_cancelled_token_makes_no_attempts() {
        let cancel = CancelToken::new();
        cancel.cancel();

        let mut calls = 0;
        let result: Result<(), _> = run_attempts(&quick_profile(3), &cancel, |_| {
            calls += 1;
            Ok(())
        });

        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_cancel_between_attempts_stops_the_sequence() {
        let cancel = CancelToken::new();
        let mut calls = 0;

        let result: Result<(), _> = run_attempts(&quick_profile(5), &cancel, |_| {
            calls += 1;
            cancel.cancel();
            Err(network_failure())
        });

        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_cancel_during_attempt_skips_the_delay() {
        let profile = RetryProfile {
            max_attempts: 3,
            delay: Duration::from_secs(5),
            retryable: vec![CategoryKind::NetworkOrTimeout],
            jitter_factor: 0.0,
        };
        let cancel = CancelToken::new();
        let started = std::time::Instant::now();

        let result: Result<(), _> = run_attempts(&profile, &cancel, |_| {
            cancel.cancel();
            Err(network_failure())
        });

        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "cancelled caller slept through the retry delay"
        );
    }

    #[test]
    fn test_zero_max_attempts_still_runs_once() {
        let mut calls = 0;
        let result: Result<(), _> =
            run_attempts(&quick_profile(0), &CancelToken::new(), |_| {
                calls += 1;
                Err(network_failure())
            });

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_jittered_delay_stays_within_bounds() {
        let profile = RetryProfile {
            max_attempts: 3,
            delay: Duration::from_millis(1000),
            retryable: vec![CategoryKind::NetworkOrTimeout],
            jitter_factor: 0.25,
        };

        for _ in 0..50 {
            let delay = profile.next_delay();
            assert!(delay >= Duration::from_millis(740), "delay {delay:?} too short");
            assert!(delay <= Duration::from_millis(1010), "delay {delay:?} too long");
        }
    }

    #[test]
    fn test_no_jitter_is_exact() {
        let profile = RetryProfile {
            delay: Duration::from_millis(500),
            ..RetryProfile::default()
        };
        assert_eq!(profile.next_delay(), Duration::from_millis(500));
    }
}
