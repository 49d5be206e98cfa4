//! Breaker state surviving a registry restart through the SQLite store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::breaker_config;
use sentinel::adapters::sqlite::{
    create_migrated_test_pool, initialize_database, database_url, SqliteBreakerStateStore,
};
use sentinel::domain::models::CircuitState;
use sentinel::domain::ports::{BreakerStateStore, NullEventEmitter};
use sentinel::services::{
    BreakerMonitor, CircuitBreakerConfig, CircuitBreakerRegistry, MonitorConfig, MonitorEvent,
};

fn registry_on(store: Arc<SqliteBreakerStateStore>, config: CircuitBreakerConfig) -> CircuitBreakerRegistry {
    CircuitBreakerRegistry::with_config(Arc::new(NullEventEmitter::new()), config).with_store(store)
}

#[tokio::test]
async fn test_state_and_links_survive_restart() {
    let pool = create_migrated_test_pool().await.unwrap();
    let store = Arc::new(SqliteBreakerStateStore::new(pool));

    let first = registry_on(Arc::clone(&store), breaker_config(2, 300));
    first.register("gateway", None);
    first.register("llm", Some("gateway"));
    first.register("search", None);
    for _ in 0..2 {
        let _ = first.call("search", || Err::<(), _>("timeout"));
    }
    first.trip("gateway", "manual_trip").unwrap();
    assert_eq!(first.save_state(None).await.unwrap(), 3);

    let second = registry_on(Arc::clone(&store), breaker_config(2, 300));
    assert_eq!(second.load_state().await.unwrap(), 3);

    let summary = second.summary();
    let gateway = summary["gateway"].status().unwrap();
    assert_eq!(gateway.state, CircuitState::Open);
    assert_eq!(gateway.trip_count, 1);
    assert_eq!(summary["llm"].status().unwrap().state, CircuitState::Open);
    assert_eq!(summary["llm"].status().unwrap().parent.as_deref(), Some("gateway"));
    assert_eq!(summary["search"].status().unwrap().failure_count, 2);

    // the restored link still cascades
    second.reset("gateway").unwrap();
    second.reset("llm").unwrap();
    second.trip("gateway", "manual_trip").unwrap();
    assert_eq!(second.get("llm").unwrap().state().unwrap(), CircuitState::Open);
}

#[tokio::test]
async fn test_delete_state_and_unregister() {
    let pool = create_migrated_test_pool().await.unwrap();
    let store = Arc::new(SqliteBreakerStateStore::new(pool));
    let registry = registry_on(Arc::clone(&store), CircuitBreakerConfig::default());

    registry.register("llm", None);
    registry.save_state(Some("llm")).await.unwrap();
    assert!(store.load("llm").await.unwrap().is_some());

    assert!(registry.unregister("llm"));
    assert!(registry.delete_state("llm").await.unwrap());
    assert!(store.load_all().await.unwrap().is_empty());
    assert!(!registry.delete_state("llm").await.unwrap());
}

#[tokio::test]
async fn test_file_database_shared_between_registries() {
    let dir = tempfile::tempdir().unwrap();
    let url = database_url(&dir.path().join("breakers.db").display().to_string());

    let writer_pool = initialize_database(&url, None).await.unwrap();
    let writer = registry_on(
        Arc::new(SqliteBreakerStateStore::new(writer_pool)),
        CircuitBreakerConfig::default(),
    );
    writer.register("payments", None);
    writer.trip("payments", "manual_trip").unwrap();
    writer.shutdown().await.unwrap();

    let reader_pool = initialize_database(&url, None).await.unwrap();
    let reader = registry_on(
        Arc::new(SqliteBreakerStateStore::new(reader_pool)),
        CircuitBreakerConfig::default(),
    );
    reader.load_state().await.unwrap();
    assert_eq!(reader.get("payments").unwrap().state().unwrap(), CircuitState::Open);
}

#[tokio::test]
async fn test_monitor_persists_recovery_each_cycle() {
    let pool = create_migrated_test_pool().await.unwrap();
    let store = Arc::new(SqliteBreakerStateStore::new(pool));
    let registry = Arc::new(registry_on(Arc::clone(&store), breaker_config(1, 0)));
    registry.register("llm", None);
    registry.trip("llm", "manual_trip").unwrap();

    let mut config = MonitorConfig::with_interval(Duration::from_millis(20));
    config.persist_each_cycle = true;
    let (handle, mut events) = BreakerMonitor::new(Arc::clone(&registry), config).start();

    let half_opened = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.recv().await {
            if let MonitorEvent::CheckCompleted { half_opened, .. } = event {
                if !half_opened.is_empty() {
                    return half_opened;
                }
            }
        }
        Vec::new()
    })
    .await
    .unwrap();
    assert_eq!(half_opened, vec!["llm".to_string()]);

    let status = handle.stop_and_wait().await;
    assert!(status.total_runs >= 1);
    assert_eq!(status.persist_failures, 0);
    assert_eq!(
        store.load("llm").await.unwrap().unwrap().state,
        CircuitState::HalfOpen
    );
}
