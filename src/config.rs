//! Declarative configuration
//!
//! A serde-friendly description of circuits and operations, typically parsed
//! from a TOML file at startup and turned into a ready [`Orchestrator`] with
//! [`OrchestrationConfig::build`]. Operations naming the same circuit share
//! one live [`CircuitBreaker`] instance.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::circuit::{CircuitBreaker, CircuitProfile};
use crate::classify::CategoryKind;
use crate::fallback::FallbackPolicy;
use crate::pipeline::CompositionOrder;
use crate::registry::{OperationProfile, Orchestrator};
use crate::retry::RetryProfile;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An operation named a circuit that is not declared.
    #[error("operation '{operation}' references unknown circuit '{circuit}'")]
    UnknownCircuit { operation: String, circuit: String },

    /// `max-attempts` must be at least 1; the initial attempt always runs.
    #[error("operation '{operation}' declares max-attempts = 0")]
    ZeroAttempts { operation: String },

    /// A window must hold at least one outcome.
    #[error("circuit '{circuit}' declares window-size = 0")]
    ZeroWindow { circuit: String },

    /// At least one probe must be admitted while half-open, or the circuit
    /// could never close again.
    #[error("circuit '{circuit}' declares probe-limit = 0")]
    ZeroProbeLimit { circuit: String },
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OrchestrationConfig {
    pub circuits: HashMap<String, CircuitConfig>,
    pub operations: HashMap<String, OperationConfig>,
}

/// One named circuit. Field defaults mirror [`CircuitProfile::default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CircuitConfig {
    pub window_size: usize,
    pub failure_rate_threshold: f64,
    /// Defaults to `window_size` when omitted.
    pub minimum_calls: Option<usize>,
    pub open_wait_ms: u64,
    pub probe_limit: usize,
    pub record_client_errors: bool,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        let profile = CircuitProfile::default();
        Self {
            window_size: profile.window_size,
            failure_rate_threshold: profile.failure_rate_threshold,
            minimum_calls: None,
            open_wait_ms: profile.open_wait.as_millis() as u64,
            probe_limit: profile.probe_limit,
            record_client_errors: profile.record_client_errors,
        }
    }
}

impl CircuitConfig {
    fn to_profile(&self) -> CircuitProfile {
        CircuitProfile {
            window_size: self.window_size,
            failure_rate_threshold: self.failure_rate_threshold.clamp(0.0, 1.0),
            minimum_calls: self.minimum_calls.unwrap_or(self.window_size),
            open_wait: Duration::from_millis(self.open_wait_ms),
            probe_limit: self.probe_limit,
            record_client_errors: self.record_client_errors,
        }
    }
}

/// One named operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OperationConfig {
    /// Circuit this operation runs under. Defaults to the operation's own
    /// name; a circuit that is only ever named implicitly is created with
    /// default settings.
    pub circuit: Option<String>,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub retry_on: Vec<CategoryKind>,
    pub jitter_factor: f64,
    pub order: CompositionOrder,
    pub fallback: FallbackPolicy,
}

impl Default for OperationConfig {
    fn default() -> Self {
        let retry = RetryProfile::default();
        Self {
            circuit: None,
            max_attempts: retry.max_attempts,
            retry_delay_ms: retry.delay.as_millis() as u64,
            retry_on: retry.retryable,
            jitter_factor: retry.jitter_factor,
            order: CompositionOrder::default(),
            fallback: FallbackPolicy::default(),
        }
    }
}

impl OrchestrationConfig {
    /// Instantiate every declared circuit and operation.
    ///
    /// Circuits are created once and shared by reference between the
    /// operations that name them.
    pub fn build(self) -> Result<Orchestrator, ConfigError> {
        for (circuit, cfg) in &self.circuits {
            if cfg.window_size == 0 {
                return Err(ConfigError::ZeroWindow {
                    circuit: circuit.clone(),
                });
            }
            if cfg.probe_limit == 0 {
                return Err(ConfigError::ZeroProbeLimit {
                    circuit: circuit.clone(),
                });
            }
        }

        let mut circuits: HashMap<String, Arc<CircuitBreaker>> = self
            .circuits
            .iter()
            .map(|(name, cfg)| {
                (
                    name.clone(),
                    Arc::new(CircuitBreaker::new(name.clone(), cfg.to_profile())),
                )
            })
            .collect();

        let mut builder = Orchestrator::builder();
        for (operation, cfg) in self.operations {
            if cfg.max_attempts == 0 {
                return Err(ConfigError::ZeroAttempts { operation });
            }

            let circuit = match &cfg.circuit {
                Some(name) => circuits
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownCircuit {
                        operation: operation.clone(),
                        circuit: name.clone(),
                    })?,
                None => circuits
                    .entry(operation.clone())
                    .or_insert_with(|| {
                        Arc::new(CircuitBreaker::new(
                            operation.clone(),
                            CircuitConfig::default().to_profile(),
                        ))
                    })
                    .clone(),
            };

            let retry = RetryProfile {
                max_attempts: cfg.max_attempts,
                delay: Duration::from_millis(cfg.retry_delay_ms),
                retryable: cfg.retry_on,
                jitter_factor: cfg.jitter_factor,
            };

            builder = builder.operation(
                operation,
                OperationProfile::new(circuit)
                    .retry(retry)
                    .order(cfg.order)
                    .fallback(cfg.fallback),
            );
        }

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RemoteFailure;

    const SAMPLE: &str = r#"
        [circuits.catalog]
        window-size = 10
        failure-rate-threshold = 0.5
        open-wait-ms = 10000
        probe-limit = 2

        [operations.fetch-by-id]
        circuit = "catalog"
        max-attempts = 3
        retry-delay-ms = 0
        retry-on = ["network-or-timeout"]

        [operations.list-all]
        circuit = "catalog"
        max-attempts = 1
        fallback = "empty-collection"
    "#;

    #[test]
    fn test_parses_and_builds_from_toml() {
        let config: OrchestrationConfig = toml::from_str(SAMPLE).unwrap();
        let orchestrator = config.build().unwrap();

        assert!(orchestrator.profile("fetch-by-id").is_some());
        let list = orchestrator.profile("list-all").unwrap();
        assert_eq!(list.fallback, FallbackPolicy::EmptyCollection);
        assert_eq!(list.retry.max_attempts, 1);
    }

    #[test]
    fn test_operations_share_the_named_circuit() {
        let config: OrchestrationConfig = toml::from_str(SAMPLE).unwrap();
        let orchestrator = config.build().unwrap();

        let a = &orchestrator.profile("fetch-by-id").unwrap().circuit;
        let b = &orchestrator.profile("list-all").unwrap().circuit;
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn test_omitted_minimum_calls_defaults_to_window_size() {
        let config: OrchestrationConfig = toml::from_str(
            r#"
            [circuits.catalog]
            window-size = 10

            [operations.fetch-by-id]
            circuit = "catalog"
            retry-delay-ms = 0
            "#,
        )
        .unwrap();
        let orchestrator = config.build().unwrap();
        let circuit = &orchestrator.profile("fetch-by-id").unwrap().circuit;

        // Ten failures fill the window and meet the implicit minimum.
        for _ in 0..10 {
            let _: Result<(), _> =
                orchestrator.execute("fetch-by-id", || Err(RemoteFailure::network("down")));
        }
        assert!(circuit.is_open());
    }

    #[test]
    fn test_implicit_circuit_takes_the_operation_name() {
        let config: OrchestrationConfig = toml::from_str(
            r#"
            [operations.fetch-by-id]
            max-attempts = 2
            "#,
        )
        .unwrap();
        let orchestrator = config.build().unwrap();

        let circuit = &orchestrator.profile("fetch-by-id").unwrap().circuit;
        assert_eq!(circuit.name(), "fetch-by-id");
    }

    #[test]
    fn test_unknown_circuit_is_rejected() {
        let config: OrchestrationConfig = toml::from_str(
            r#"
            [operations.fetch-by-id]
            circuit = "nonexistent"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.build().unwrap_err(),
            ConfigError::UnknownCircuit {
                operation: "fetch-by-id".to_string(),
                circuit: "nonexistent".to_string(),
            }
        );
    }

    #[test]
    fn test_zero_window_size_is_rejected() {
        let config: OrchestrationConfig = toml::from_str(
            r#"
            [circuits.catalog]
            window-size = 0
            "#,
        )
        .unwrap();

        assert_eq!(
            config.build().unwrap_err(),
            ConfigError::ZeroWindow {
                circuit: "catalog".to_string(),
            }
        );
    }

    #[test]
    fn test_zero_probe_limit_is_rejected() {
        let config: OrchestrationConfig = toml::from_str(
            r#"
            [circuits.catalog]
            probe-limit = 0

            [operations.fetch-by-id]
            circuit = "catalog"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.build().unwrap_err(),
            ConfigError::ZeroProbeLimit {
                circuit: "catalog".to_string(),
            }
        );
    }

    #[test]
    fn test_zero_attempts_is_rejected() {
        let config: OrchestrationConfig = toml::from_str(
            r#"
            [operations.fetch-by-id]
            max-attempts = 0
            "#,
        )
        .unwrap();

        assert_eq!(
            config.build().unwrap_err(),
            ConfigError::ZeroAttempts {
                operation: "fetch-by-id".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_document_builds_an_empty_orchestrator() {
        let config: OrchestrationConfig = toml::from_str("").unwrap();
        let orchestrator = config.build().unwrap();
        assert_eq!(orchestrator.operations().count(), 0);
    }
}
