//! Registry owning every circuit breaker in the process.
//!
//! Two kinds of lock are in play. The registry lock guards only the
//! name → breaker map and the configuration used for new breakers. Each
//! breaker guards its own state. Readers copy the map under the registry
//! lock, release it, and only then touch individual breakers, so the
//! registry lock is never taken while a breaker lock is held.
//!
//! Both are `std::sync::Mutex`. Nothing here needs an async runtime except
//! `execute` and the persistence methods, which never hold a lock across
//! an await point.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::try_join_all;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CircuitBreakersConfig, StateChangeEvent, SummaryEntry};
use crate::domain::ports::{BreakerStateStore, EventEmitter};
use crate::services::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};

struct RegistryInner {
    breakers: HashMap<String, Arc<CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
    component_configs: HashMap<String, CircuitBreakerConfig>,
}

impl RegistryInner {
    fn config_for(&self, component: Option<&str>) -> CircuitBreakerConfig {
        component
            .and_then(|c| self.component_configs.get(c))
            .unwrap_or(&self.default_config)
            .clone()
    }
}

/// Owner of all circuit breakers, keyed by name.
pub struct CircuitBreakerRegistry {
    inner: Mutex<RegistryInner>,
    emitter: Arc<dyn EventEmitter>,
    store: Option<Arc<dyn BreakerStateStore>>,
}

impl CircuitBreakerRegistry {
    /// Create an empty registry using the default breaker configuration.
    pub fn new(emitter: Arc<dyn EventEmitter>) -> Self {
        Self::with_config(emitter, CircuitBreakerConfig::default())
    }

    pub fn with_config(emitter: Arc<dyn EventEmitter>, default_config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                breakers: HashMap::new(),
                default_config,
                component_configs: HashMap::new(),
            }),
            emitter,
            store: None,
        }
    }

    /// Attach a store used by `save_state` and `load_state`.
    pub fn with_store(mut self, store: Arc<dyn BreakerStateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Apply the configured defaults and component overrides.
    pub fn configure(&self, config: &CircuitBreakersConfig, metric_window: chrono::Duration) {
        let mut inner = self.lock_inner();
        inner.default_config =
            CircuitBreakerConfig::from(&config.default).with_metric_window(metric_window);
        for (component, settings) in &config.components {
            inner.component_configs.insert(
                component.clone(),
                CircuitBreakerConfig::from(settings).with_metric_window(metric_window),
            );
        }
    }

    /// Configuration for breakers created from now on.
    pub fn set_default_config(&self, config: CircuitBreakerConfig) {
        self.lock_inner().default_config = config;
    }

    pub fn register_component_config(&self, component: impl Into<String>, config: CircuitBreakerConfig) {
        self.lock_inner()
            .component_configs
            .insert(component.into(), config);
    }

    /// Get or create the breaker called `name`.
    ///
    /// Idempotent: registering an existing name returns the same breaker.
    /// A parent that is not registered is logged and ignored.
    pub fn register(&self, name: &str, parent: Option<&str>) -> Arc<CircuitBreaker> {
        self.register_with(name, None, parent)
    }

    /// Like `register`, using the component's configuration for a new breaker.
    pub fn register_for_component(
        &self,
        name: &str,
        component: &str,
        parent: Option<&str>,
    ) -> Arc<CircuitBreaker> {
        self.register_with(name, Some(component), parent)
    }

    fn register_with(
        &self,
        name: &str,
        component: Option<&str>,
        parent: Option<&str>,
    ) -> Arc<CircuitBreaker> {
        let (breaker, parent_breaker, created) = {
            let mut inner = self.lock_inner();
            let (breaker, created) = match inner.breakers.get(name) {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    let config = inner.config_for(component);
                    let breaker = Arc::new(CircuitBreaker::new(name, config, Arc::clone(&self.emitter)));
                    inner.breakers.insert(name.to_string(), Arc::clone(&breaker));
                    (breaker, true)
                }
            };
            let parent_breaker = parent.and_then(|p| inner.breakers.get(p).cloned());
            (breaker, parent_breaker, created)
        };

        if created {
            tracing::info!(breaker = %name, component = ?component, "Registered circuit breaker");
        }

        if let Some(parent_name) = parent {
            match parent_breaker {
                Some(parent_breaker) => {
                    if let Err(e) = CircuitBreaker::link(&parent_breaker, &breaker) {
                        tracing::warn!(breaker = %name, parent = %parent_name, error = %e, "Failed to link parent");
                    }
                }
                None => {
                    tracing::warn!(breaker = %name, parent = %parent_name, "Parent circuit not found");
                }
            }
        }

        breaker
    }

    /// Make `child` trip whenever `parent` trips. Both must be registered.
    pub fn register_dependency(&self, child: &str, parent: &str) -> DomainResult<()> {
        let child_breaker = self.require(child)?;
        let parent_breaker = self.require(parent)?;
        CircuitBreaker::link(&parent_breaker, &child_breaker)?;
        tracing::info!(child = %child, parent = %parent, "Registered breaker dependency");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.lock_inner().breakers.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock_inner().breakers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.lock_inner().breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_inner().breakers.is_empty()
    }

    /// Remove a breaker. Handles still held elsewhere report it as removed.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.lock_inner().breakers.remove(name);
        match removed {
            Some(breaker) => {
                breaker.mark_removed();
                breaker.detach();
                tracing::info!(breaker = %name, "Unregistered circuit breaker");
                true
            }
            None => false,
        }
    }

    /// Force a breaker open. Returns whether it transitioned.
    pub fn trip(&self, name: &str, reason: &str) -> DomainResult<bool> {
        self.require(name)?.trip(reason)
    }

    /// Force a breaker closed. Returns whether it transitioned.
    pub fn reset(&self, name: &str) -> DomainResult<bool> {
        self.require(name)?.reset()
    }

    /// Close every breaker, returning how many transitioned.
    pub fn reset_all(&self) -> usize {
        self.snapshot()
            .into_iter()
            .filter(|(name, breaker)| match breaker.reset() {
                Ok(changed) => changed,
                Err(e) => {
                    tracing::warn!(breaker = %name, error = %e, "Failed to reset breaker");
                    false
                }
            })
            .count()
    }

    pub fn history(&self, name: &str) -> DomainResult<Vec<StateChangeEvent>> {
        self.require(name)?.history()
    }

    /// Status of every breaker.
    ///
    /// Safe to call from plain synchronous code with no runtime. A breaker
    /// whose state cannot be read gets an error entry instead of failing
    /// the whole summary.
    pub fn summary(&self) -> BTreeMap<String, SummaryEntry> {
        self.snapshot()
            .into_iter()
            .map(|(name, breaker)| {
                let entry = match breaker.status() {
                    Ok(status) => SummaryEntry::Status(Box::new(status)),
                    Err(e) => {
                        tracing::warn!(breaker = %name, error = %e, "Breaker status unreadable");
                        SummaryEntry::Error {
                            error: e.to_string(),
                        }
                    }
                };
                (name, entry)
            })
            .collect()
    }

    /// Move every open breaker whose cooldown elapsed to half-open.
    /// Returns the names that transitioned.
    pub fn check_all(&self) -> Vec<String> {
        let mut transitioned = Vec::new();
        for (name, breaker) in self.snapshot() {
            match breaker.refresh() {
                Ok(Some(_)) => transitioned.push(name),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(breaker = %name, error = %e, "Skipping unreadable breaker");
                }
            }
        }
        transitioned.sort();
        transitioned
    }

    /// Run a future under the named breaker, creating it if needed.
    pub async fn execute<F, T, E>(&self, name: &str, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let breaker = self.register(name, None);
        breaker.execute(operation).await
    }

    pub async fn execute_for_component<F, T, E>(
        &self,
        name: &str,
        component: &str,
        operation: F,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let breaker = self.register_for_component(name, component, None);
        breaker.execute(operation).await
    }

    /// Run a closure under the named breaker, creating it if needed.
    pub fn call<F, T, E>(&self, name: &str, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::fmt::Display,
    {
        self.register(name, None).call(operation)
    }

    /// Persist one breaker, or all of them when `name` is `None`.
    /// Returns how many records were written.
    pub async fn save_state(&self, name: Option<&str>) -> DomainResult<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };

        let records = match name {
            Some(name) => vec![self.require(name)?.to_record()?],
            None => self
                .snapshot()
                .into_iter()
                .filter_map(|(name, breaker)| match breaker.to_record() {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!(breaker = %name, error = %e, "Not persisting unreadable breaker");
                        None
                    }
                })
                .collect(),
        };

        try_join_all(records.iter().map(|record| store.save(record))).await?;
        tracing::debug!(count = records.len(), "Saved circuit breaker states");
        Ok(records.len())
    }

    /// Restore every stored breaker, registering the ones not yet known,
    /// then re-link parents. Returns how many were restored.
    pub async fn load_state(&self) -> DomainResult<usize> {
        let Some(store) = &self.store else {
            tracing::info!("No state store configured for circuit breakers");
            return Ok(0);
        };

        let records = store.load_all().await?;
        for record in &records {
            self.register(&record.name, None).restore(record)?;
        }
        for record in &records {
            if let Some(parent) = &record.parent {
                if let Err(e) = self.register_dependency(&record.name, parent) {
                    tracing::warn!(breaker = %record.name, parent = %parent, error = %e, "Failed to restore parent link");
                }
            }
        }

        tracing::info!(count = records.len(), "Loaded circuit breaker states");
        Ok(records.len())
    }

    /// Delete the stored record for a breaker.
    pub async fn delete_state(&self, name: &str) -> DomainResult<bool> {
        match &self.store {
            Some(store) => store.delete(name).await,
            None => Ok(false),
        }
    }

    /// Persist everything before the registry is dropped.
    pub async fn shutdown(&self) -> DomainResult<()> {
        let saved = self.save_state(None).await?;
        tracing::info!(saved, "Circuit breaker registry shut down");
        Ok(())
    }

    fn require(&self, name: &str) -> DomainResult<Arc<CircuitBreaker>> {
        self.get(name)
            .ok_or_else(|| DomainError::BreakerNotFound(name.to_string()))
    }

    /// Copy of the map taken under a short registry lock.
    fn snapshot(&self) -> Vec<(String, Arc<CircuitBreaker>)> {
        self.lock_inner()
            .breakers
            .iter()
            .map(|(name, breaker)| (name.clone(), Arc::clone(breaker)))
            .collect()
    }

    fn lock_inner(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BreakerRecord, BreakerSettings, CircuitState};
    use crate::domain::ports::NullEventEmitter;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    fn registry() -> CircuitBreakerRegistry {
        CircuitBreakerRegistry::new(Arc::new(NullEventEmitter::new()))
    }

    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<BTreeMap<String, BreakerRecord>>,
    }

    #[async_trait]
    impl BreakerStateStore for MemoryStore {
        async fn save(&self, record: &BreakerRecord) -> DomainResult<()> {
            self.records
                .lock()
                .unwrap()
                .insert(record.name.clone(), record.clone());
            Ok(())
        }

        async fn load_all(&self) -> DomainResult<Vec<BreakerRecord>> {
            Ok(self.records.lock().unwrap().values().cloned().collect())
        }

        async fn load(&self, name: &str) -> DomainResult<Option<BreakerRecord>> {
            Ok(self.records.lock().unwrap().get(name).cloned())
        }

        async fn delete(&self, name: &str) -> DomainResult<bool> {
            Ok(self.records.lock().unwrap().remove(name).is_some())
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = registry();
        let first = registry.register("planner", None);
        let second = registry.register("planner", None);

        assert!(Arc::ptr_eq(&first, &second));
        first.trip("manual").unwrap();
        assert_eq!(second.state().unwrap(), CircuitState::Open);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_with_missing_parent_still_registers() {
        let registry = registry();
        let breaker = registry.register("planner", Some("llm"));
        assert!(breaker.parent_name().is_none());
        assert_eq!(registry.names(), vec!["planner".to_string()]);
    }

    #[test]
    fn test_component_config_applies_to_new_breakers() {
        let registry = registry();
        registry.register_component_config("llm", CircuitBreakerConfig::sensitive());

        let breaker = registry.register_for_component("llm.openai", "llm", None);
        assert_eq!(breaker.config().failure_threshold, 3);

        let plain = registry.register("validator", None);
        assert_eq!(plain.config().failure_threshold, 5);
    }

    #[test]
    fn test_configure_from_settings() {
        let registry = registry();
        let mut config = CircuitBreakersConfig::default();
        config.default.failure_threshold = 7;
        config.components.insert(
            "llm".to_string(),
            BreakerSettings {
                failure_threshold: 2,
                ..Default::default()
            },
        );
        registry.configure(&config, Duration::seconds(600));

        assert_eq!(registry.register("a", None).config().failure_threshold, 7);
        let llm = registry.register_for_component("b", "llm", None);
        assert_eq!(llm.config().failure_threshold, 2);
        assert_eq!(llm.config().metric_window, Duration::seconds(600));
    }

    #[test]
    fn test_summary_reports_every_breaker() {
        let registry = registry();
        registry.register("a", None);
        registry.register("b", None).record_failure("boom").unwrap();

        let summary = registry.summary();
        assert_eq!(summary.len(), 2);
        let b = summary["b"].status().unwrap();
        assert_eq!(b.state, CircuitState::Closed);
        assert_eq!(b.failure_count, 1);
        assert!(b.last_failure.is_some());
    }

    #[test]
    fn test_summary_isolates_unreadable_breaker() {
        let registry = registry();
        registry.register("healthy", None);
        let broken = registry.register("broken", None);
        broken.poison_for_test();

        let summary = registry.summary();
        assert_eq!(summary.len(), 2);
        assert!(summary["broken"].is_error());
        assert!(summary["healthy"].status().is_some());
    }

    #[test]
    fn test_unregistered_handle_reports_removed() {
        let registry = registry();
        let parent = registry.register("llm", None);
        let child = registry.register("planner", Some("llm"));

        assert!(registry.unregister("llm"));
        assert!(!registry.unregister("llm"));
        assert!(registry.get("llm").is_none());
        assert!(child.parent_name().is_none());
        assert!(matches!(parent.status(), Err(DomainError::BreakerRemoved(_))));
    }

    #[test]
    fn test_parent_trip_cascades_through_registry() {
        let registry = registry();
        registry.register("llm", None);
        registry.register("planner", Some("llm"));
        registry.register("validator", None);
        registry.register_dependency("validator", "llm").unwrap();

        assert!(registry.trip("llm", "provider outage").unwrap());

        let summary = registry.summary();
        for name in ["llm", "planner", "validator"] {
            assert_eq!(summary[name].status().unwrap().state, CircuitState::Open, "{name}");
        }
        assert_eq!(summary["planner"].status().unwrap().parent.as_deref(), Some("llm"));
    }

    #[test]
    fn test_register_dependency_rejects_parent_cycle() {
        let registry = registry();
        registry.register("a", None);
        registry.register("b", None);
        registry.register("c", None);
        registry.register_dependency("a", "b").unwrap();
        registry.register_dependency("b", "c").unwrap();

        assert!(matches!(
            registry.register_dependency("b", "a"),
            Err(DomainError::ValidationFailed(_))
        ));
        assert!(matches!(
            registry.register_dependency("c", "a"),
            Err(DomainError::ValidationFailed(_))
        ));
        assert_eq!(registry.get("b").unwrap().parent_name().as_deref(), Some("c"));
        assert!(registry.get("c").unwrap().parent().is_none());
    }

    #[test]
    fn test_tripped_chain_recovers_after_cooldown() {
        let registry = registry();
        registry.set_default_config(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::zero(),
            ..Default::default()
        });
        registry.register("a", None);
        registry.register("b", None);
        registry.register_dependency("a", "b").unwrap();
        assert!(registry.register_dependency("b", "a").is_err());

        registry.trip("b", "outage").unwrap();
        assert_eq!(registry.get("a").unwrap().state().unwrap(), CircuitState::Open);

        // The child waits for its parent to leave OPEN, so allow one extra cycle.
        let mut moved = registry.check_all();
        moved.extend(registry.check_all());
        moved.sort();
        assert_eq!(moved, vec!["a".to_string(), "b".to_string()]);
        for name in ["a", "b"] {
            assert_eq!(registry.get(name).unwrap().state().unwrap(), CircuitState::HalfOpen);
        }
    }

    #[test]
    fn test_relinking_moves_child_to_new_parent() {
        let registry = registry();
        registry.register("old", None);
        registry.register("new", None);
        registry.register("child", Some("old"));

        registry.register_dependency("child", "new").unwrap();

        assert_eq!(registry.get("child").unwrap().parent_name().as_deref(), Some("new"));
        assert!(registry.get("old").unwrap().children().is_empty());
    }

    #[test]
    fn test_unknown_names_are_errors() {
        let registry = registry();
        assert!(matches!(registry.trip("ghost", "x"), Err(DomainError::BreakerNotFound(_))));
        assert!(matches!(registry.reset("ghost"), Err(DomainError::BreakerNotFound(_))));
        assert!(registry.register_dependency("ghost", "other").is_err());
    }

    #[test]
    fn test_reset_all_counts_transitions() {
        let registry = registry();
        registry.register("a", None);
        registry.register("b", None);
        registry.register("c", None);
        registry.trip("a", "x").unwrap();
        registry.trip("b", "x").unwrap();

        assert_eq!(registry.reset_all(), 2);
        assert_eq!(registry.reset_all(), 0);
    }

    #[test]
    fn test_check_all_half_opens_expired_breakers() {
        let registry = registry();
        registry.set_default_config(CircuitBreakerConfig {
            recovery_timeout: Duration::zero(),
            ..Default::default()
        });
        registry.register("expired", None).trip("x").unwrap();
        registry.register("closed", None);

        assert_eq!(registry.check_all(), vec!["expired".to_string()]);
        assert_eq!(
            registry.get("expired").unwrap().state().unwrap(),
            CircuitState::HalfOpen
        );
        assert!(registry.check_all().is_empty());
    }

    #[test]
    fn test_call_creates_breaker() {
        let registry = registry();
        let result: Result<u8, CircuitBreakerError<String>> = registry.call("parser", || Ok(1));
        assert_eq!(result.unwrap(), 1);
        assert!(registry.get("parser").is_some());
    }

    #[tokio::test]
    async fn test_execute_rejects_when_open() {
        let registry = registry();
        registry.register("llm", None).trip("down").unwrap();

        let result = registry.execute("llm", async { Ok::<_, String>(()) }).await;
        assert!(result.unwrap_err().is_circuit_open());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip_through_store() {
        let store = Arc::new(MemoryStore::default());
        let emitter: Arc<dyn EventEmitter> = Arc::new(NullEventEmitter::new());

        let original = CircuitBreakerRegistry::new(emitter.clone()).with_store(store.clone());
        original.register("llm", None);
        original.register("planner", Some("llm"));
        original.trip("llm", "outage").unwrap();
        assert_eq!(original.save_state(None).await.unwrap(), 2);

        let restored = CircuitBreakerRegistry::new(emitter).with_store(store.clone());
        assert_eq!(restored.load_state().await.unwrap(), 2);

        let summary = restored.summary();
        assert_eq!(summary["llm"].status().unwrap().state, CircuitState::Open);
        assert_eq!(summary["llm"].status().unwrap().trip_count, 1);
        assert_eq!(summary["planner"].status().unwrap().state, CircuitState::Open);
        assert_eq!(summary["planner"].status().unwrap().parent.as_deref(), Some("llm"));

        assert!(restored.delete_state("planner").await.unwrap());
        assert!(store.load("planner").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_without_store_is_noop() {
        let registry = registry();
        registry.register("a", None);
        assert_eq!(registry.save_state(None).await.unwrap(), 0);
        assert_eq!(registry.load_state().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_single_unknown_breaker_fails() {
        let registry = registry().with_store(Arc::new(MemoryStore::default()));
        assert!(matches!(
            registry.save_state(Some("ghost")).await,
            Err(DomainError::BreakerNotFound(_))
        ));
    }

    #[test]
    fn test_restore_keeps_last_state_change() {
        let registry = registry();
        let breaker = registry.register("llm", None);
        let earlier = Utc::now() - Duration::seconds(120);
        let mut record = breaker.to_record().unwrap();
        record.state = CircuitState::Open;
        record.last_state_change = earlier;
        breaker.restore(&record).unwrap();

        // cooldown measured from the restored timestamp
        assert!(breaker.check().unwrap().is_allowed());
    }
}
