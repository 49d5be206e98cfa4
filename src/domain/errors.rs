//! Domain errors for the sentinel resilience layer.

use thiserror::Error;

/// Domain-level errors that can occur in sentinel.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Circuit breaker not found: {0}")]
    BreakerNotFound(String),

    #[error("Circuit breaker {name} state is unreadable: {reason}")]
    BreakerStateUnreadable { name: String, reason: String },

    #[error("Circuit breaker {0} was removed from the registry")]
    BreakerRemoved(String),

    #[error("Invalid circuit state: {0}")]
    InvalidCircuitState(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
