//! Port trait definitions (Hexagonal Architecture)
//!
//! - EventEmitter: fire-and-forget sink for breaker state changes
//! - BreakerStateStore: durable breaker state across restarts

pub mod breaker_state_store;
pub mod event_emitter;
pub mod null_emitter;

pub use breaker_state_store::BreakerStateStore;
pub use event_emitter::{EmitError, EventEmitter, EventPriority};
pub use null_emitter::NullEventEmitter;
