//! Resilient remote-call orchestration.
//!
//! `guardrail` wraps synchronous remote calls in a fixed pipeline of
//! protections: a sliding-window circuit breaker, a bounded retry executor
//! driven by error classification, and a fallback dispatcher that resolves
//! every terminal failure into a small caller-visible error taxonomy.
//!
//! Callers register named operations once and execute through the
//! [`Orchestrator`]:
//!
//! ```
//! use guardrail::{CircuitBreaker, OperationProfile, Orchestrator, RemoteFailure};
//! use std::sync::Arc;
//!
//! let circuit = Arc::new(CircuitBreaker::builder("catalog").build());
//! let orchestrator = Orchestrator::builder()
//!     .operation("fetch-by-id", OperationProfile::new(circuit))
//!     .build();
//!
//! let value = orchestrator
//!     .execute("fetch-by-id", || Ok::<_, RemoteFailure>(42))
//!     .unwrap();
//! assert_eq!(value, 42);
//! ```
//!
//! The circuit's OPEN → HALF_OPEN transition is evaluated lazily on the
//! calling path against an injectable clock, so behavior is deterministic
//! under test and no background timer thread exists.

pub mod builder;
pub mod callbacks;
pub mod cancel;
pub mod circuit;
pub mod classify;
pub mod clock;
pub mod config;
pub mod errors;
pub mod fallback;
pub mod pipeline;
mod probe;
pub mod registry;
pub mod retry;
pub mod window;

pub use builder::{CircuitBuilder, OrchestratorBuilder};
pub use callbacks::Callbacks;
pub use cancel::CancelToken;
pub use circuit::{CallPermit, CircuitBreaker, CircuitProfile, Rejection};
pub use classify::{CategoryKind, ClassifiedFailure, ErrorCategory, classify};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{CircuitConfig, ConfigError, OperationConfig, OrchestrationConfig};
pub use errors::{CatalogError, RemoteFailure};
pub use fallback::FallbackPolicy;
pub use pipeline::{CompositionOrder, PipelineError};
pub use registry::{OperationProfile, Orchestrator};
pub use retry::RetryProfile;
pub use window::{Outcome, SlidingWindow};
