//! Operation registry
//!
//! The [`Orchestrator`] is the single entry point callers use: a fixed map of
//! named operations, each bound to a circuit, a retry profile, a composition
//! order and a fallback policy. Several operations may share one circuit so
//! that all traffic to one upstream trips together.

use std::collections::HashMap;
use std::sync::Arc;

use crate::builder::OrchestratorBuilder;
use crate::cancel::CancelToken;
use crate::circuit::CircuitBreaker;
use crate::errors::{CatalogError, RemoteFailure};
use crate::fallback::{self, FallbackPolicy};
use crate::pipeline::{self, CompositionOrder};
use crate::retry::RetryProfile;

/// Everything needed to execute one named operation.
#[derive(Debug, Clone)]
pub struct OperationProfile {
    pub circuit: Arc<CircuitBreaker>,
    pub retry: RetryProfile,
    pub order: CompositionOrder,
    pub fallback: FallbackPolicy,
}

impl OperationProfile {
    /// A profile with default retry, ordering and fallback around the given
    /// circuit.
    pub fn new(circuit: Arc<CircuitBreaker>) -> Self {
        Self {
            circuit,
            retry: RetryProfile::default(),
            order: CompositionOrder::default(),
            fallback: FallbackPolicy::default(),
        }
    }

    pub fn retry(mut self, retry: RetryProfile) -> Self {
        self.retry = retry;
        self
    }

    pub fn order(mut self, order: CompositionOrder) -> Self {
        self.order = order;
        self
    }

    pub fn fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }
}

/// Immutable registry of named operation profiles.
///
/// Built once at startup via [`Orchestrator::builder`] or from a parsed
/// configuration file; shared freely afterwards.
#[derive(Debug, Default)]
pub struct Orchestrator {
    profiles: HashMap<String, OperationProfile>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub(crate) fn from_profiles(profiles: HashMap<String, OperationProfile>) -> Self {
        Self { profiles }
    }

    /// Look up a registered operation profile.
    pub fn profile(&self, operation: &str) -> Option<&OperationProfile> {
        self.profiles.get(operation)
    }

    /// Registered operation names, in no particular order.
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Execute a single-result operation under its registered protections.
    ///
    /// Every failure surfaces as a [`CatalogError`]; there is no degraded
    /// result for single-result operations.
    ///
    /// # Panics
    ///
    /// Panics if `operation` was never registered. An unknown operation name
    /// is a wiring bug, not a runtime condition.
    pub fn execute<T, F>(&self, operation: &str, call: F) -> Result<T, CatalogError>
    where
        F: FnMut() -> Result<T, RemoteFailure>,
    {
        self.execute_cancellable(operation, &CancelToken::new(), call)
    }

    /// [`execute`](Self::execute) with caller-controlled cancellation.
    pub fn execute_cancellable<T, F>(
        &self,
        operation: &str,
        cancel: &CancelToken,
        mut call: F,
    ) -> Result<T, CatalogError>
    where
        F: FnMut() -> Result<T, RemoteFailure>,
    {
        let profile = self.require(operation);
        pipeline::run(&profile.circuit, &profile.retry, profile.order, cancel, &mut call)
            .map_err(|err| fallback::raise(operation, err))
    }

    /// Execute a collection-returning operation.
    ///
    /// With [`FallbackPolicy::EmptyCollection`] a recoverable failure (outage
    /// or circuit rejection) degrades to an empty vector instead of raising;
    /// business errors and cancellation always raise.
    ///
    /// # Panics
    ///
    /// Panics if `operation` was never registered.
    pub fn execute_collection<T, F>(&self, operation: &str, call: F) -> Result<Vec<T>, CatalogError>
    where
        F: FnMut() -> Result<Vec<T>, RemoteFailure>,
    {
        self.execute_collection_cancellable(operation, &CancelToken::new(), call)
    }

    /// [`execute_collection`](Self::execute_collection) with caller-controlled
    /// cancellation.
    pub fn execute_collection_cancellable<T, F>(
        &self,
        operation: &str,
        cancel: &CancelToken,
        mut call: F,
    ) -> Result<Vec<T>, CatalogError>
    where
        F: FnMut() -> Result<Vec<T>, RemoteFailure>,
    {
        let profile = self.require(operation);
        match pipeline::run(&profile.circuit, &profile.retry, profile.order, cancel, &mut call) {
            Ok(items) => Ok(items),
            Err(err) => {
                if profile.fallback == FallbackPolicy::EmptyCollection && fallback::recoverable(&err)
                {
                    tracing::info!(operation, "degrading to empty collection");
                    Ok(Vec::new())
                } else {
                    Err(fallback::raise(operation, err))
                }
            }
        }
    }

    fn require(&self, operation: &str) -> &OperationProfile {
        match self.profiles.get(operation) {
            Some(profile) => profile,
            None => panic!("no operation profile registered for '{operation}'"),
        }
    }
}
