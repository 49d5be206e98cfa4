//! Sentinel: circuit breakers and planning-graph validation for
//! multi-stage generation pipelines.
//!
//! Two subsystems make up the core:
//!
//! - **Circuit breakers** (`services::circuit_breaker`, `services::breaker_registry`):
//!   per-dependency state machines that can be driven from threads, tokio
//!   tasks, or plain synchronous code, with parent/child cascading and
//!   optional SQLite persistence.
//! - **Dependency validation** (`services::graph_validator`,
//!   `services::cross_consistency`, `services::responsibility_router`):
//!   structural checks of data-flow and component graphs, a cross-check
//!   that the two agree, and routing of errors to the producer that must
//!   fix them.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Service Layer** (`services`): breakers, validators and the event bus
//! - **Adapters** (`adapters`): SQLite breaker state store
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sentinel::domain::ports::NullEventEmitter;
//! use sentinel::services::CircuitBreakerRegistry;
//!
//! let registry = CircuitBreakerRegistry::new(Arc::new(NullEventEmitter::new()));
//! let result: Result<u32, sentinel::services::CircuitBreakerError<String>> =
//!     registry.call("llm", || Ok::<_, String>(42));
//! assert_eq!(result.ok(), Some(42));
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    CircuitState, Config, FeedbackPayload, ResponsibleParty, ValidationError, ValidationReport,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{CircuitBreakerRegistry, DependencyValidator, EventBus};
