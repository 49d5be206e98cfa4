//! Null event emitter implementation.
//!
//! Used when nothing consumes breaker events but the registry
//! still needs an EventEmitter.

use uuid::Uuid;

use super::event_emitter::{EmitError, EventEmitter, EventPriority};

/// An emitter that accepts and drops every event.
#[derive(Debug, Clone, Default)]
pub struct NullEventEmitter;

impl NullEventEmitter {
    pub fn new() -> Self {
        Self
    }
}

impl EventEmitter for NullEventEmitter {
    fn emit(
        &self,
        _event_type: &str,
        _payload: serde_json::Value,
        _correlation_id: Option<Uuid>,
        _priority: EventPriority,
    ) -> Result<(), EmitError> {
        Ok(())
    }
}
