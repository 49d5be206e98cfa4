//! Services: breaker state machines, the registry and its monitor, graph
//! validation and the event bus.

pub mod breaker_monitor;
pub mod breaker_registry;
pub mod circuit_breaker;
pub mod cross_consistency;
pub mod dependency_graph;
pub mod dependency_validator;
pub mod event_bus;
pub mod graph_validator;
pub mod reliability_metrics;
pub mod responsibility_router;

pub use breaker_monitor::{
    BreakerMonitor, MonitorConfig, MonitorEvent, MonitorHandle, MonitorStatus, StopReason,
};
pub use breaker_registry::CircuitBreakerRegistry;
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitCheckResult,
    STATE_CHANGED_EVENT,
};
pub use cross_consistency::check_cross_consistency;
pub use dependency_graph::DependencyGraph;
pub use dependency_validator::{DependencyValidator, VALIDATION_COMPLETED_EVENT};
pub use event_bus::{ChannelEmitter, EventBus, EventId, SentinelEvent, SequenceNumber};
pub use graph_validator::{
    validate_flow_graph, validate_flow_value, validate_structure_graph, validate_structure_value,
};
pub use reliability_metrics::ReliabilityMetrics;
pub use responsibility_router::{
    determine_responsible_party, prepare_feedback, route, OwnershipTally,
};
