//! Common test utilities for integration tests
//!
//! Shared fixtures for registry and validation tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;

use sentinel::domain::ports::NullEventEmitter;
use sentinel::services::{ChannelEmitter, CircuitBreakerConfig, CircuitBreakerRegistry, SentinelEvent};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn breaker_config(failure_threshold: u32, recovery_secs: i64) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold,
        recovery_timeout: chrono::Duration::seconds(recovery_secs),
        ..Default::default()
    }
}

/// Registry that discards state change events.
pub fn quiet_registry(config: CircuitBreakerConfig) -> Arc<CircuitBreakerRegistry> {
    Arc::new(CircuitBreakerRegistry::with_config(
        Arc::new(NullEventEmitter::new()),
        config,
    ))
}

/// Registry whose state change events can be drained from the returned receiver.
pub fn observed_registry(
    config: CircuitBreakerConfig,
) -> (Arc<CircuitBreakerRegistry>, tokio::sync::mpsc::Receiver<SentinelEvent>) {
    let (emitter, rx) = ChannelEmitter::new(1024);
    let registry = CircuitBreakerRegistry::with_config(Arc::new(emitter), config);
    (Arc::new(registry), rx)
}

pub fn flow(source: &str, destination: &str) -> Value {
    json!({"source": source, "destination": destination, "data_type": "payload"})
}

pub fn flow_doc(flows: &[(&str, &str)]) -> Value {
    json!({"data_flows": flows.iter().map(|(s, d)| flow(s, d)).collect::<Vec<_>>()})
}

pub fn component(name: &str, sequence_number: i64, required: &[&str]) -> Value {
    json!({
        "name": name,
        "sequence_number": sequence_number,
        "dependencies": {"required": required, "optional": []}
    })
}

pub fn structure_doc(components: Vec<Value>) -> Value {
    json!({"ordered_components": components})
}
