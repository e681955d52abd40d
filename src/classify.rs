//! Failure classification
//!
//! Maps a raw [`RemoteFailure`] into one of four fixed categories. The
//! mapping is a pure function and is the single source of truth consulted by
//! both the retry executor (may this be retried?) and the fallback dispatcher
//! (what does the caller see?).

use serde::{Deserialize, Serialize};

use crate::errors::RemoteFailure;

/// Category assigned to a failed call attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connectivity failure or timeout; the upstream never answered.
    NetworkOrTimeout,
    /// The upstream answered with a 4xx status: a caller/business mistake,
    /// not an infrastructure symptom.
    BusinessClientError(u16),
    /// The upstream answered with a 5xx (or otherwise unexpected) status.
    ServerError(u16),
    /// The circuit breaker rejected the attempt before any call was made.
    CircuitRejected,
}

impl ErrorCategory {
    /// The status-free kind of this category, used in retry configuration.
    pub fn kind(&self) -> CategoryKind {
        match self {
            Self::NetworkOrTimeout => CategoryKind::NetworkOrTimeout,
            Self::BusinessClientError(_) => CategoryKind::BusinessClientError,
            Self::ServerError(_) => CategoryKind::ServerError,
            Self::CircuitRejected => CategoryKind::CircuitRejected,
        }
    }

    /// Whether this category represents transient infrastructure trouble.
    ///
    /// Only these categories count toward a circuit's failure rate by
    /// default and are sensible candidates for retrying.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::NetworkOrTimeout | Self::ServerError(_))
    }
}

/// [`ErrorCategory`] without the embedded status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryKind {
    NetworkOrTimeout,
    BusinessClientError,
    ServerError,
    CircuitRejected,
}

/// Classify a raw remote failure.
///
/// Deterministic and side-effect-free. Statuses outside 4xx are treated as
/// server errors; the upstream answering anything unexpected is an
/// infrastructure symptom, not a caller mistake. `CircuitRejected` is never
/// produced here: it originates in the pipeline when `try_acquire` refuses
/// an attempt.
pub fn classify(failure: &RemoteFailure) -> ErrorCategory {
    match failure {
        RemoteFailure::Network { .. } => ErrorCategory::NetworkOrTimeout,
        RemoteFailure::Http { status, .. } if (400..500).contains(status) => {
            ErrorCategory::BusinessClientError(*status)
        }
        RemoteFailure::Http { status, .. } => ErrorCategory::ServerError(*status),
    }
}

/// A remote failure paired with its category, passed between pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFailure {
    pub category: ErrorCategory,
    /// The original failure; `None` for circuit rejections, which never
    /// reached the remote call.
    pub failure: Option<RemoteFailure>,
}

impl ClassifiedFailure {
    /// Classify a failure returned by the remote call.
    pub fn from_remote(failure: RemoteFailure) -> Self {
        Self {
            category: classify(&failure),
            failure: Some(failure),
        }
    }

    /// A rejection issued by the circuit breaker itself.
    pub fn rejected() -> Self {
        Self {
            category: ErrorCategory::CircuitRejected,
            failure: None,
        }
    }

    /// Upstream detail string, if any survived classification.
    pub fn detail(&self) -> Option<String> {
        self.failure
            .as_ref()
            .and_then(|f| f.detail())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_failures_are_network_or_timeout() {
        let category = classify(&RemoteFailure::network("read timed out"));
        assert_eq!(category, ErrorCategory::NetworkOrTimeout);
        assert!(category.is_infrastructure());
    }

    #[test]
    fn test_4xx_is_business_client_error_with_code() {
        assert_eq!(
            classify(&RemoteFailure::http(404)),
            ErrorCategory::BusinessClientError(404)
        );
        assert_eq!(
            classify(&RemoteFailure::http(409)),
            ErrorCategory::BusinessClientError(409)
        );
        assert!(!classify(&RemoteFailure::http(422)).is_infrastructure());
    }

    #[test]
    fn test_5xx_is_server_error_with_code() {
        let category = classify(&RemoteFailure::http(503));
        assert_eq!(category, ErrorCategory::ServerError(503));
        assert!(category.is_infrastructure());
    }

    #[test]
    fn test_unexpected_status_treated_as_server_error() {
        assert_eq!(
            classify(&RemoteFailure::http(302)),
            ErrorCategory::ServerError(302)
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let failure = RemoteFailure::Http {
            status: 500,
            detail: Some("boom".to_string()),
        };
        assert_eq!(classify(&failure), classify(&failure));
    }

    #[test]
    fn test_classified_failure_carries_detail() {
        let classified = ClassifiedFailure::from_remote(RemoteFailure::Http {
            status: 422,
            detail: Some("bad sku".to_string()),
        });
        assert_eq!(classified.detail(), Some("bad sku".to_string()));

        let rejected = ClassifiedFailure::rejected();
        assert_eq!(rejected.category, ErrorCategory::CircuitRejected);
        assert_eq!(rejected.detail(), None);
    }
}
