//! Boundary and caller-visible error types

use thiserror::Error;

/// Failure raised by the remote call abstraction.
///
/// The orchestration core never looks at the transport itself; it only needs
/// a classifiable failure on error. Connectivity problems and timeouts arrive
/// as [`RemoteFailure::Network`], everything the upstream answered with a
/// non-success status as [`RemoteFailure::Http`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteFailure {
    /// The call never produced a response (connect error, reset, timeout).
    #[error("network failure: {message}")]
    Network { message: String },

    /// The upstream answered with an error status.
    ///
    /// `detail` is an optional structured detail string from the response
    /// body; it is passed through unmodified into raised domain errors.
    #[error("upstream returned status {status}")]
    Http { status: u16, detail: Option<String> },
}

impl RemoteFailure {
    /// Convenience constructor for connectivity/timeout failures.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Convenience constructor for an HTTP error status without detail.
    pub fn http(status: u16) -> Self {
        Self::Http {
            status,
            detail: None,
        }
    }

    /// The structured detail string, if the upstream supplied one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Network { .. } => None,
            Self::Http { detail, .. } => detail.as_deref(),
        }
    }
}

/// The only failure taxonomy callers of `execute` ever see.
///
/// Raw transport errors, circuit rejections and exhausted retries are all
/// resolved into one of these five kinds by the fallback dispatcher; a caller
/// never observes a raw network error or a silently missing result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The upstream reported 404 for the addressed resource.
    #[error("resource not found")]
    NotFound { detail: Option<String> },

    /// The upstream reported 409, typically a uniqueness conflict.
    #[error("resource already exists")]
    AlreadyExists { detail: Option<String> },

    /// The operation could not be completed: the circuit rejected the call,
    /// retries were exhausted on an infrastructure failure, or the upstream
    /// kept answering 5xx.
    #[error("operation '{operation}' is currently unavailable")]
    ServiceUnavailable { operation: String },

    /// Pass-through for business 4xx codes other than 404/409, with the
    /// upstream status and detail preserved for diagnostics.
    #[error("upstream rejected the request with status {status}")]
    ValidationFailed { status: u16, detail: Option<String> },

    /// The caller cancelled the operation mid-flight.
    #[error("operation cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_failure_detail_passthrough() {
        let failure = RemoteFailure::Http {
            status: 422,
            detail: Some("name must not be blank".to_string()),
        };
        assert_eq!(failure.detail(), Some("name must not be blank"));

        let network = RemoteFailure::network("connection refused");
        assert_eq!(network.detail(), None);
    }

    #[test]
    fn test_display_messages() {
        let err = CatalogError::ServiceUnavailable {
            operation: "fetch-by-id".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "operation 'fetch-by-id' is currently unavailable"
        );

        let err = CatalogError::ValidationFailed {
            status: 422,
            detail: None,
        };
        assert_eq!(
            err.to_string(),
            "upstream rejected the request with status 422"
        );
    }
}
