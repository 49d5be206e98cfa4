//! Breaker state store port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::BreakerRecord;

/// Durable storage for circuit breaker state.
#[async_trait]
pub trait BreakerStateStore: Send + Sync {
    /// Insert or replace the record for `record.name`.
    async fn save(&self, record: &BreakerRecord) -> DomainResult<()>;

    /// Load every stored record, ordered by name.
    async fn load_all(&self) -> DomainResult<Vec<BreakerRecord>>;

    /// Load one record by breaker name.
    async fn load(&self, name: &str) -> DomainResult<Option<BreakerRecord>>;

    /// Delete a record. Returns whether one existed.
    async fn delete(&self, name: &str) -> DomainResult<bool>;
}
