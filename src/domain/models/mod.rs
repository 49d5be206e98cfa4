pub mod breaker;
pub mod config;
pub mod flow_graph;
pub mod structure_graph;
pub mod validation;

pub use breaker::{
    BreakerRecord, BreakerStatus, CircuitState, HealthStatus, StateChangeEvent, SummaryEntry,
};
pub use config::{
    BreakerSettings, CircuitBreakersConfig, Config, DatabaseConfig, EventBusConfig,
    LoggingConfig, MonitoringConfig,
};
pub use flow_graph::{DataFlow, FlowGraph, ParsedFlowGraph, EXTERNAL_NODE};
pub use structure_graph::{Component, ComponentDependencies, ParsedStructureGraph, StructureGraph};
pub use validation::{
    ErrorContext, ErrorKind, FeedbackPayload, ResponsibleParty, ValidationError,
    ValidationEvent, ValidationEventType, ValidationReport, ValidationStatus, ValidationSummary,
    FLOW_OWNED, STRUCTURE_OWNED,
};
