//! SQLite implementation of the BreakerStateStore.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::adapters::sqlite::{parse_datetime, parse_optional_datetime};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BreakerRecord, CircuitState};
use crate::domain::ports::BreakerStateStore;

#[derive(Clone)]
pub struct SqliteBreakerStateStore {
    pool: SqlitePool,
}

impl SqliteBreakerStateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BreakerRow {
    name: String,
    state: String,
    failure_count: i64,
    last_failure_time: Option<String>,
    last_state_change: String,
    parent: Option<String>,
    children: String,
    trip_count: i64,
    last_trip: Option<String>,
    last_reset: Option<String>,
    registered_at: String,
    saved_at: String,
}

fn row_to_record(row: BreakerRow) -> DomainResult<BreakerRecord> {
    let children: Vec<String> = serde_json::from_str(&row.children)?;
    let to_u32 = |value: i64, column: &str| {
        u32::try_from(value).map_err(|_| {
            DomainError::SerializationError(format!("{column} out of range for {}: {value}", row.name))
        })
    };

    Ok(BreakerRecord {
        state: row.state.parse::<CircuitState>()?,
        failure_count: to_u32(row.failure_count, "failure_count")?,
        last_failure_time: parse_optional_datetime(row.last_failure_time)?,
        last_state_change: parse_datetime(&row.last_state_change)?,
        parent: row.parent,
        children,
        trip_count: to_u32(row.trip_count, "trip_count")?,
        last_trip: parse_optional_datetime(row.last_trip)?,
        last_reset: parse_optional_datetime(row.last_reset)?,
        registered_at: parse_datetime(&row.registered_at)?,
        saved_at: parse_datetime(&row.saved_at)?,
        name: row.name,
    })
}

#[async_trait]
impl BreakerStateStore for SqliteBreakerStateStore {
    async fn save(&self, record: &BreakerRecord) -> DomainResult<()> {
        let children = serde_json::to_string(&record.children)?;

        sqlx::query(
            r#"INSERT INTO circuit_breakers
               (name, state, failure_count, last_failure_time, last_state_change, parent,
                children, trip_count, last_trip, last_reset, registered_at, saved_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(name) DO UPDATE SET
                 state = excluded.state,
                 failure_count = excluded.failure_count,
                 last_failure_time = excluded.last_failure_time,
                 last_state_change = excluded.last_state_change,
                 parent = excluded.parent,
                 children = excluded.children,
                 trip_count = excluded.trip_count,
                 last_trip = excluded.last_trip,
                 last_reset = excluded.last_reset,
                 registered_at = excluded.registered_at,
                 saved_at = excluded.saved_at"#,
        )
        .bind(&record.name)
        .bind(record.state.as_str())
        .bind(i64::from(record.failure_count))
        .bind(record.last_failure_time.map(|t| t.to_rfc3339()))
        .bind(record.last_state_change.to_rfc3339())
        .bind(&record.parent)
        .bind(&children)
        .bind(i64::from(record.trip_count))
        .bind(record.last_trip.map(|t| t.to_rfc3339()))
        .bind(record.last_reset.map(|t| t.to_rfc3339()))
        .bind(record.registered_at.to_rfc3339())
        .bind(record.saved_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_all(&self) -> DomainResult<Vec<BreakerRecord>> {
        let rows: Vec<BreakerRow> = sqlx::query_as("SELECT * FROM circuit_breakers ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_record).collect()
    }

    async fn load(&self, name: &str) -> DomainResult<Option<BreakerRecord>> {
        let row: Option<BreakerRow> = sqlx::query_as("SELECT * FROM circuit_breakers WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_record).transpose()
    }

    async fn delete(&self, name: &str) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM circuit_breakers WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use chrono::{Duration, SubsecRound, Utc};

    fn record(name: &str, state: CircuitState) -> BreakerRecord {
        let now = Utc::now().trunc_subsecs(6);
        BreakerRecord {
            name: name.to_string(),
            state,
            failure_count: 3,
            last_failure_time: Some(now - Duration::seconds(5)),
            last_state_change: now,
            parent: None,
            children: vec!["child".to_string()],
            trip_count: 1,
            last_trip: Some(now),
            last_reset: None,
            registered_at: now - Duration::minutes(10),
            saved_at: now,
        }
    }

    async fn setup_store() -> SqliteBreakerStateStore {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteBreakerStateStore::new(pool)
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = setup_store().await;
        let original = record("llm", CircuitState::Open);

        store.save(&original).await.unwrap();
        let loaded = store.load("llm").await.unwrap().unwrap();
        assert_eq!(loaded, original);
        assert!(store.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_existing_row() {
        let store = setup_store().await;
        store.save(&record("llm", CircuitState::Open)).await.unwrap();

        let mut updated = record("llm", CircuitState::Closed);
        updated.failure_count = 0;
        updated.parent = Some("gateway".to_string());
        store.save(&updated).await.unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].state, CircuitState::Closed);
        assert_eq!(all[0].parent.as_deref(), Some("gateway"));
    }

    #[tokio::test]
    async fn test_load_all_ordered_by_name() {
        let store = setup_store().await;
        for name in ["zeta", "alpha", "mid"] {
            store.save(&record(name, CircuitState::HalfOpen)).await.unwrap();
        }

        let names: Vec<String> = store.load_all().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = setup_store().await;
        store.save(&record("llm", CircuitState::Closed)).await.unwrap();

        assert!(store.delete("llm").await.unwrap());
        assert!(!store.delete("llm").await.unwrap());
        assert!(store.load_all().await.unwrap().is_empty());
    }
}
