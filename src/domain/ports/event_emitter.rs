//! Event emission port.
//!
//! Breakers report every state transition through this trait. Emission is
//! synchronous and must not block: callers log and discard any error.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Delivery priority attached to an emitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl std::fmt::Display for EventPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Why an event could not be handed off.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmitError {
    #[error("event sink is closed")]
    Closed,

    #[error("event sink is full, dropped {event_type}")]
    Full { event_type: String },

    #[error("event {event_type} rejected: {reason}")]
    Rejected { event_type: String, reason: String },
}

/// Fire-and-forget sink for domain events.
pub trait EventEmitter: Send + Sync {
    /// Hand an event to the sink without waiting for delivery.
    fn emit(
        &self,
        event_type: &str,
        payload: serde_json::Value,
        correlation_id: Option<Uuid>,
        priority: EventPriority,
    ) -> Result<(), EmitError>;
}
