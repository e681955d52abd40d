//! Fallback dispatch
//!
//! The last pipeline stage: turns whatever the pipeline could not recover
//! from into the caller-visible [`CatalogError`] taxonomy. The mapping is
//! total; no pipeline failure leaks through unresolved.

use serde::{Deserialize, Serialize};

use crate::classify::ErrorCategory;
use crate::errors::CatalogError;
use crate::pipeline::PipelineError;

/// What a collection-returning operation does when the failure is
/// recoverable by degradation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Always raise; no degraded result. This is the default.
    #[default]
    FailFast,
    /// Return an empty collection instead of raising when the failure is an
    /// infrastructure outage or circuit rejection. Business errors and
    /// cancellation still raise.
    EmptyCollection,
}

/// Whether degrading to an empty collection is acceptable for this failure.
///
/// Infrastructure trouble and circuit rejections mean "the data is
/// temporarily unreachable", which an empty listing can stand in for.
/// Business 4xx answers are definitive and must surface.
pub(crate) fn recoverable(err: &PipelineError) -> bool {
    match err {
        PipelineError::Cancelled => false,
        PipelineError::Failure(failure) => !matches!(
            failure.category,
            ErrorCategory::BusinessClientError(_)
        ),
    }
}

/// Resolve a terminal pipeline failure into the domain taxonomy.
pub(crate) fn raise(operation: &str, err: PipelineError) -> CatalogError {
    match err {
        PipelineError::Cancelled => CatalogError::Cancelled,
        PipelineError::Failure(failure) => {
            let detail = failure.detail();
            match failure.category {
                ErrorCategory::BusinessClientError(404) => CatalogError::NotFound { detail },
                ErrorCategory::BusinessClientError(409) => CatalogError::AlreadyExists { detail },
                ErrorCategory::BusinessClientError(status) => {
                    CatalogError::ValidationFailed { status, detail }
                }
                ErrorCategory::NetworkOrTimeout
                | ErrorCategory::ServerError(_)
                | ErrorCategory::CircuitRejected => CatalogError::ServiceUnavailable {
                    operation: operation.to_string(),
                },
            }
        }
    }
}
