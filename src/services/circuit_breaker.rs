//! Circuit breaker pattern for failure detection and recovery.
//!
//! A breaker guards one call site. After `failure_threshold` consecutive
//! failures it opens and rejects calls without running them. Once the
//! recovery timeout has passed it admits a trial call, closing on success
//! and reopening on failure.
//!
//! All state lives behind a plain `std::sync::Mutex`, so every method here
//! is callable from synchronous code and from inside an async runtime alike.
//! The lock is never held across an `.await`, and event emission and
//! cascading happen only after it is released.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    BreakerRecord, BreakerSettings, BreakerStatus, CircuitState, StateChangeEvent,
};
use crate::domain::ports::{EventEmitter, EventPriority};
use crate::services::reliability_metrics::{seconds_between, ReliabilityMetrics};

/// Event type emitted on every state transition.
pub const STATE_CHANGED_EVENT: &str = "circuit_breaker.state_changed";

/// Transitions kept per breaker.
pub const HISTORY_LIMIT: usize = 100;

/// Configuration for circuit breakers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time to keep the circuit open before admitting a trial call.
    pub recovery_timeout: Duration,
    /// Failures older than this no longer count toward the threshold.
    pub failure_window: Duration,
    /// Trial calls admitted while half-open.
    pub half_open_max_tries: u32,
    /// Window used for error density.
    pub metric_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::seconds(30),
            failure_window: Duration::seconds(60),
            half_open_max_tries: 1,
            metric_window: Duration::seconds(3600),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a more sensitive circuit breaker.
    pub fn sensitive() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::seconds(60),
            failure_window: Duration::seconds(300),
            ..Default::default()
        }
    }

    /// Create a more resilient circuit breaker.
    pub fn resilient() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::seconds(120),
            failure_window: Duration::seconds(600),
            ..Default::default()
        }
    }

    pub fn with_metric_window(mut self, window: Duration) -> Self {
        self.metric_window = window;
        self
    }
}

impl From<&BreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &BreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            recovery_timeout: seconds(settings.recovery_timeout_secs),
            failure_window: seconds(settings.failure_window_secs),
            half_open_max_tries: settings.half_open_max_tries,
            ..Default::default()
        }
    }
}

/// Converts configured seconds, clamping absurd values to a century.
pub fn seconds(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or_else(|| Duration::weeks(52 * 100))
}

/// Result of a circuit breaker check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitCheckResult {
    /// Request is allowed.
    Allowed,
    /// Request is blocked by open circuit.
    Blocked {
        name: String,
        opened_at: DateTime<Utc>,
        retry_after: DateTime<Utc>,
    },
    /// Circuit is in half-open state and this request is the trial call.
    Testing { name: String },
}

impl CircuitCheckResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed | Self::Testing { .. })
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// Mutable breaker state, only touched under the breaker's lock.
#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<DateTime<Utc>>,
    last_error: Option<String>,
    last_state_change: DateTime<Utc>,
    half_open_in_flight: u32,
    half_open_successes: u32,
    trip_count: u32,
    last_trip: Option<DateTime<Utc>>,
    last_reset: Option<DateTime<Utc>>,
    history: VecDeque<StateChangeEvent>,
    metrics: ReliabilityMetrics,
}

impl BreakerState {
    fn new(config: &CircuitBreakerConfig, now: DateTime<Utc>) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            last_error: None,
            last_state_change: now,
            half_open_in_flight: 0,
            half_open_successes: 0,
            trip_count: 0,
            last_trip: None,
            last_reset: None,
            history: VecDeque::new(),
            metrics: ReliabilityMetrics::new(config.metric_window),
        }
    }

    fn transition(
        &mut self,
        name: &str,
        to: CircuitState,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> StateChangeEvent {
        let from = self.state;
        self.metrics
            .record_state_duration(from, seconds_between(self.last_state_change, now));

        self.half_open_in_flight = 0;
        self.half_open_successes = 0;
        match to {
            CircuitState::Open => {
                self.trip_count += 1;
                self.last_trip = Some(now);
            }
            CircuitState::HalfOpen => {}
            CircuitState::Closed => {
                self.failure_count = 0;
                self.last_reset = Some(now);
                if let Some(tripped) = self.last_trip {
                    self.metrics.record_recovery(seconds_between(tripped, now));
                }
            }
        }
        self.state = to;
        self.last_state_change = now;

        let event = StateChangeEvent {
            breaker_name: name.to_string(),
            old_state: from,
            new_state: to,
            timestamp: now,
            reason: reason.into(),
        };
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(event.clone());
        event
    }

    /// Forget consecutive failures once the failure window has passed.
    fn expire_failures(&mut self, config: &CircuitBreakerConfig, now: DateTime<Utc>) {
        if self.state != CircuitState::Closed || self.failure_count == 0 {
            return;
        }
        if let Some(last) = self.last_failure_time {
            if now - last >= config.failure_window {
                self.failure_count = 0;
            }
        }
    }

    fn cooldown_elapsed(&self, config: &CircuitBreakerConfig, now: DateTime<Utc>) -> bool {
        now - self.last_state_change >= config.recovery_timeout
    }
}

/// A named circuit breaker guarding one call site.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    parent: Mutex<Option<Weak<CircuitBreaker>>>,
    children: Mutex<Vec<Weak<CircuitBreaker>>>,
    emitter: Arc<dyn EventEmitter>,
    registered_at: DateTime<Utc>,
    removed: AtomicBool,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("registered_at", &self.registered_at)
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Create a new closed circuit breaker.
    pub fn new(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            inner: Mutex::new(BreakerState::new(&config, now)),
            config,
            parent: Mutex::new(None),
            children: Mutex::new(Vec::new()),
            emitter,
            registered_at: now,
            removed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    /// Whether the breaker has been unregistered.
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> DomainResult<CircuitState> {
        self.ensure_present()?;
        Ok(self.lock_state()?.state)
    }

    /// Make `child` follow `parent`: the child is forced open whenever the
    /// parent opens. If the parent is already open the child trips now.
    pub fn link(parent: &Arc<Self>, child: &Arc<Self>) -> DomainResult<()> {
        if Arc::ptr_eq(parent, child) {
            return Err(DomainError::ValidationFailed(format!(
                "circuit breaker {} cannot be its own parent",
                child.name
            )));
        }

        // Parent links stay acyclic.
        let mut ancestor = parent.parent();
        while let Some(current) = ancestor {
            if Arc::ptr_eq(&current, child) {
                return Err(DomainError::ValidationFailed(format!(
                    "linking {} under {} would create a parent cycle",
                    child.name, parent.name
                )));
            }
            ancestor = current.parent();
        }

        let previous = relation(&child.parent).replace(Arc::downgrade(parent));
        if let Some(previous) = previous.and_then(|p| p.upgrade()) {
            if !Arc::ptr_eq(&previous, parent) {
                tracing::warn!(
                    breaker = %child.name,
                    previous_parent = %previous.name,
                    parent = %parent.name,
                    "Replacing circuit breaker parent"
                );
                previous.remove_child(child);
            }
        }

        {
            let mut children = relation(&parent.children);
            children.retain(|c| c.strong_count() > 0);
            if !children.iter().any(|c| c.as_ptr() == Arc::as_ptr(child)) {
                children.push(Arc::downgrade(child));
            }
        }

        if parent.state()? == CircuitState::Open {
            child.trip(format!("cascading trip from parent {}", parent.name))?;
        }
        Ok(())
    }

    pub fn parent(&self) -> Option<Arc<Self>> {
        relation(&self.parent).as_ref().and_then(Weak::upgrade)
    }

    pub fn parent_name(&self) -> Option<String> {
        self.parent().map(|p| p.name.clone())
    }

    pub fn children(&self) -> Vec<Arc<Self>> {
        relation(&self.children)
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub fn children_names(&self) -> Vec<String> {
        self.children().iter().map(|c| c.name.clone()).collect()
    }

    /// Check whether a call may proceed.
    pub fn check(&self) -> DomainResult<CircuitCheckResult> {
        self.check_at(Utc::now())
    }

    pub fn check_at(&self, now: DateTime<Utc>) -> DomainResult<CircuitCheckResult> {
        self.ensure_present()?;

        if let Some((opened_at, retry_after)) = self.open_parent_window()? {
            let event = {
                let mut state = self.lock_state()?;
                state.metrics.record_rejected();
                (state.state != CircuitState::Open).then(|| {
                    state.transition(
                        &self.name,
                        CircuitState::Open,
                        "parent circuit open",
                        now,
                    )
                })
            };
            if let Some(event) = event {
                self.publish(&event);
            }
            return Ok(CircuitCheckResult::Blocked {
                name: self.name.clone(),
                opened_at,
                retry_after,
            });
        }

        let (result, event) = {
            let mut state = self.lock_state()?;
            state.expire_failures(&self.config, now);

            let event = (state.state == CircuitState::Open
                && state.cooldown_elapsed(&self.config, now))
            .then(|| {
                state.transition(
                    &self.name,
                    CircuitState::HalfOpen,
                    "recovery_timeout_elapsed",
                    now,
                )
            });

            let result = match state.state {
                CircuitState::Closed => CircuitCheckResult::Allowed,
                CircuitState::HalfOpen
                    if state.half_open_in_flight < self.config.half_open_max_tries =>
                {
                    state.half_open_in_flight += 1;
                    CircuitCheckResult::Testing {
                        name: self.name.clone(),
                    }
                }
                CircuitState::HalfOpen => {
                    state.metrics.record_rejected();
                    CircuitCheckResult::Blocked {
                        name: self.name.clone(),
                        opened_at: state.last_trip.unwrap_or(state.last_state_change),
                        retry_after: now,
                    }
                }
                CircuitState::Open => {
                    state.metrics.record_rejected();
                    CircuitCheckResult::Blocked {
                        name: self.name.clone(),
                        opened_at: state.last_state_change,
                        retry_after: state.last_state_change + self.config.recovery_timeout,
                    }
                }
            };
            (result, event)
        };

        if let Some(event) = event {
            self.publish(&event);
        }
        Ok(result)
    }

    /// Record a successful call.
    pub fn record_success(&self) -> DomainResult<()> {
        self.record_success_at(Utc::now())
    }

    pub fn record_success_at(&self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_present()?;
        let event = {
            let mut state = self.lock_state()?;
            state.metrics.record_success();
            match state.state {
                CircuitState::HalfOpen => {
                    state.half_open_in_flight = state.half_open_in_flight.saturating_sub(1);
                    state.half_open_successes += 1;
                    (state.half_open_successes >= self.config.half_open_max_tries).then(|| {
                        state.transition(
                            &self.name,
                            CircuitState::Closed,
                            "trial_call_succeeded",
                            now,
                        )
                    })
                }
                CircuitState::Closed => {
                    state.failure_count = 0;
                    None
                }
                CircuitState::Open => None,
            }
        };

        if let Some(event) = event {
            self.publish(&event);
        }
        Ok(())
    }

    /// Record a failed call.
    pub fn record_failure(&self, error: impl Into<String>) -> DomainResult<()> {
        self.record_failure_at(error, Utc::now())
    }

    pub fn record_failure_at(&self, error: impl Into<String>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_present()?;
        let error = error.into();
        let event = {
            let mut state = self.lock_state()?;
            state.expire_failures(&self.config, now);
            state.failure_count += 1;
            state.last_failure_time = Some(now);
            state.last_error = Some(error.clone());
            state.metrics.record_failure(now);

            match state.state {
                CircuitState::HalfOpen => Some(state.transition(
                    &self.name,
                    CircuitState::Open,
                    "trial_call_failed",
                    now,
                )),
                CircuitState::Closed if state.failure_count >= self.config.failure_threshold => {
                    Some(state.transition(
                        &self.name,
                        CircuitState::Open,
                        "failure_threshold_exceeded",
                        now,
                    ))
                }
                _ => None,
            }
        };

        tracing::debug!(breaker = %self.name, error = %error, "Circuit breaker recorded failure");
        if let Some(event) = event {
            self.publish(&event);
        }
        Ok(())
    }

    /// Force the circuit open. Returns whether a transition happened.
    pub fn trip(&self, reason: impl Into<String>) -> DomainResult<bool> {
        self.trip_at(reason, Utc::now())
    }

    pub fn trip_at(&self, reason: impl Into<String>, now: DateTime<Utc>) -> DomainResult<bool> {
        self.ensure_present()?;
        let event = {
            let mut state = self.lock_state()?;
            (state.state != CircuitState::Open)
                .then(|| state.transition(&self.name, CircuitState::Open, reason, now))
        };

        match event {
            Some(event) => {
                self.publish(&event);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Force the circuit closed. Returns whether a transition happened.
    pub fn reset(&self) -> DomainResult<bool> {
        self.reset_at(Utc::now())
    }

    pub fn reset_at(&self, now: DateTime<Utc>) -> DomainResult<bool> {
        self.ensure_present()?;
        let event = {
            let mut state = self.lock_state()?;
            if state.state == CircuitState::Closed {
                state.failure_count = 0;
                None
            } else {
                Some(state.transition(&self.name, CircuitState::Closed, "manual_reset", now))
            }
        };

        match event {
            Some(event) => {
                self.publish(&event);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Move an open breaker to half-open once its cooldown has elapsed.
    /// Breakers whose parent is open stay open.
    pub fn refresh(&self) -> DomainResult<Option<StateChangeEvent>> {
        self.refresh_at(Utc::now())
    }

    pub fn refresh_at(&self, now: DateTime<Utc>) -> DomainResult<Option<StateChangeEvent>> {
        self.ensure_present()?;
        if self.open_parent_window()?.is_some() {
            return Ok(None);
        }

        let event = {
            let mut state = self.lock_state()?;
            state.expire_failures(&self.config, now);
            (state.state == CircuitState::Open && state.cooldown_elapsed(&self.config, now)).then(
                || {
                    state.transition(
                        &self.name,
                        CircuitState::HalfOpen,
                        "recovery_timeout_elapsed",
                        now,
                    )
                },
            )
        };

        if let Some(event) = &event {
            self.publish(event);
        }
        Ok(event)
    }

    pub fn status(&self) -> DomainResult<BreakerStatus> {
        self.status_at(Utc::now())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> DomainResult<BreakerStatus> {
        self.ensure_present()?;
        let parent = self.parent_name();
        let state = self.lock_state()?;
        Ok(BreakerStatus {
            state: state.state,
            failure_count: state.failure_count,
            last_failure: state.last_failure_time,
            last_error: state.last_error.clone(),
            last_state_change: state.last_state_change,
            parent,
            health: state.state.health(),
            trip_count: state.trip_count,
            last_trip: state.last_trip,
            last_reset: state.last_reset,
            error_density: state.metrics.error_density(now),
            avg_recovery_time_secs: state.metrics.avg_recovery_time(),
            state_durations_secs: state.metrics.state_durations(
                state.state,
                state.last_state_change,
                now,
            ),
        })
    }

    /// Most recent transitions, oldest first.
    pub fn history(&self) -> DomainResult<Vec<StateChangeEvent>> {
        self.ensure_present()?;
        Ok(self.lock_state()?.history.iter().cloned().collect())
    }

    /// Durable snapshot of this breaker.
    pub fn to_record(&self) -> DomainResult<BreakerRecord> {
        self.ensure_present()?;
        let parent = self.parent_name();
        let children = self.children_names();
        let state = self.lock_state()?;
        Ok(BreakerRecord {
            name: self.name.clone(),
            state: state.state,
            failure_count: state.failure_count,
            last_failure_time: state.last_failure_time,
            last_state_change: state.last_state_change,
            parent,
            children,
            trip_count: state.trip_count,
            last_trip: state.last_trip,
            last_reset: state.last_reset,
            registered_at: self.registered_at,
            saved_at: Utc::now(),
        })
    }

    /// Overwrite state and counters from a stored record without emitting.
    pub fn restore(&self, record: &BreakerRecord) -> DomainResult<()> {
        self.ensure_present()?;
        let mut state = self.lock_state()?;
        state.state = record.state;
        state.failure_count = record.failure_count;
        state.last_failure_time = record.last_failure_time;
        state.last_state_change = record.last_state_change;
        state.trip_count = record.trip_count;
        state.last_trip = record.last_trip;
        state.last_reset = record.last_reset;
        state.half_open_in_flight = 0;
        state.half_open_successes = 0;
        tracing::debug!(breaker = %self.name, state = %record.state, "Restored circuit breaker state");
        Ok(())
    }

    /// Run a future under the breaker.
    pub async fn execute<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let permit = self.admit()?;
        let outcome = operation.await;
        self.settle(permit, outcome)
    }

    /// Run a closure under the breaker.
    pub fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::fmt::Display,
    {
        let permit = self.admit()?;
        let outcome = operation();
        self.settle(permit, outcome)
    }

    fn admit<E>(&self) -> Result<Option<TrialPermit<'_>>, CircuitBreakerError<E>> {
        match self.check().map_err(CircuitBreakerError::Unavailable)? {
            CircuitCheckResult::Blocked {
                name,
                opened_at,
                retry_after,
            } => Err(CircuitBreakerError::CircuitOpen {
                name,
                opened_at,
                retry_after,
            }),
            CircuitCheckResult::Allowed => Ok(None),
            CircuitCheckResult::Testing { .. } => Ok(Some(TrialPermit::new(self))),
        }
    }

    fn settle<T, E: std::fmt::Display>(
        &self,
        permit: Option<TrialPermit<'_>>,
        outcome: Result<T, E>,
    ) -> Result<T, CircuitBreakerError<E>> {
        if let Some(permit) = permit {
            permit.disarm();
        }
        match outcome {
            Ok(value) => {
                if let Err(e) = self.record_success() {
                    tracing::warn!(breaker = %self.name, error = %e, "Failed to record success");
                }
                Ok(value)
            }
            Err(err) => {
                if let Err(e) = self.record_failure(err.to_string()) {
                    tracing::warn!(breaker = %self.name, error = %e, "Failed to record failure");
                }
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    /// Give back a trial slot whose call never reported an outcome.
    fn release_trial(&self) {
        if let Ok(mut state) = self.inner.lock() {
            if state.state == CircuitState::HalfOpen {
                state.half_open_in_flight = state.half_open_in_flight.saturating_sub(1);
            }
        }
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.store(true, Ordering::SeqCst);
    }

    /// Drop every parent and child link to and from this breaker.
    pub(crate) fn detach(self: &Arc<Self>) {
        let parent = relation(&self.parent).take();
        if let Some(parent) = parent.and_then(|p| p.upgrade()) {
            parent.remove_child(self);
        }
        let children = std::mem::take(&mut *relation(&self.children));
        for child in children.iter().filter_map(Weak::upgrade) {
            let mut slot = relation(&child.parent);
            if slot.as_ref().is_some_and(|p| p.as_ptr() == Arc::as_ptr(self)) {
                *slot = None;
            }
        }
    }

    fn remove_child(&self, child: &Arc<Self>) {
        relation(&self.children)
            .retain(|c| c.strong_count() > 0 && c.as_ptr() != Arc::as_ptr(child));
    }

    fn ensure_present(&self) -> DomainResult<()> {
        if self.is_removed() {
            return Err(DomainError::BreakerRemoved(self.name.clone()));
        }
        Ok(())
    }

    fn lock_state(&self) -> DomainResult<MutexGuard<'_, BreakerState>> {
        self.inner
            .lock()
            .map_err(|_| DomainError::BreakerStateUnreadable {
                name: self.name.clone(),
                reason: "state lock poisoned".to_string(),
            })
    }

    /// The parent's open window, if the parent is open.
    fn open_parent_window(&self) -> DomainResult<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let Some(parent) = self.parent() else {
            return Ok(None);
        };
        if parent.is_removed() {
            return Ok(None);
        }
        let state = parent.lock_state()?;
        Ok((state.state == CircuitState::Open).then(|| {
            (
                state.last_state_change,
                state.last_state_change + parent.config.recovery_timeout,
            )
        }))
    }

    /// Log and emit a transition, then cascade an open to every child.
    fn publish(&self, event: &StateChangeEvent) {
        tracing::info!(
            breaker = %self.name,
            from = %event.old_state,
            to = %event.new_state,
            reason = %event.reason,
            "Circuit breaker state changed"
        );

        let priority = match event.new_state {
            CircuitState::Open => EventPriority::High,
            CircuitState::HalfOpen | CircuitState::Closed => EventPriority::Normal,
        };
        match serde_json::to_value(event) {
            Ok(payload) => {
                if let Err(e) = self.emitter.emit(STATE_CHANGED_EVENT, payload, None, priority) {
                    tracing::warn!(breaker = %self.name, error = %e, "Failed to emit state change");
                }
            }
            Err(e) => {
                tracing::warn!(breaker = %self.name, error = %e, "Failed to serialize state change");
            }
        }

        if event.new_state == CircuitState::Open {
            self.cascade();
        }
    }

    fn cascade(&self) {
        let reason = format!("cascading trip from parent {}", self.name);
        for child in self.children() {
            match child.trip(reason.clone()) {
                Ok(true) => {
                    tracing::warn!(parent = %self.name, child = %child.name, "Cascaded circuit trip");
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(parent = %self.name, child = %child.name, error = %e, "Error cascading trip");
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn poison_for_test(self: &Arc<Self>) {
        let breaker = Arc::clone(self);
        let _ = std::thread::spawn(move || {
            let _guard = breaker.inner.lock();
            panic!("poisoning breaker state");
        })
        .join();
    }
}

/// Relation slots hold no invariants worth refusing to read after a panic.
fn relation<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Returns a half-open trial slot if the call never reports back, for
/// example when the wrapping future is dropped mid-flight.
struct TrialPermit<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl<'a> TrialPermit<'a> {
    fn new(breaker: &'a CircuitBreaker) -> Self {
        Self {
            breaker,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TrialPermit<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.release_trial();
        }
    }
}

/// Error from circuit breaker protected operation.
#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open and blocking requests. The operation never ran.
    CircuitOpen {
        name: String,
        opened_at: DateTime<Utc>,
        retry_after: DateTime<Utc>,
    },
    /// The underlying operation failed.
    OperationFailed(E),
    /// The breaker itself could not be consulted.
    Unavailable(DomainError),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::OperationFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CircuitOpen {
                name, retry_after, ..
            } => {
                write!(f, "Circuit breaker open for {name}, retry after {retry_after}")
            }
            Self::OperationFailed(e) => write!(f, "Operation failed: {e}"),
            Self::Unavailable(e) => write!(f, "Circuit breaker unavailable: {e}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CircuitBreakerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CircuitOpen { .. } => None,
            Self::OperationFailed(e) => Some(e),
            Self::Unavailable(e) => Some(e),
        }
    }
}
