//! Reliability metrics for a single circuit breaker.
//!
//! Tracks time spent in each state, failures inside a sliding metric window
//! and how long the breaker took to recover from each trip. The owning
//! breaker mutates these under its state lock.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};

use crate::domain::models::CircuitState;

#[derive(Debug, Clone)]
pub struct ReliabilityMetrics {
    window: Duration,
    state_durations: HashMap<CircuitState, f64>,
    failure_times: VecDeque<DateTime<Utc>>,
    recovery_total_secs: f64,
    recoveries: u64,
    total_successes: u64,
    total_failures: u64,
    total_rejected: u64,
}

impl ReliabilityMetrics {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state_durations: HashMap::new(),
            failure_times: VecDeque::new(),
            recovery_total_secs: 0.0,
            recoveries: 0,
            total_successes: 0,
            total_failures: 0,
            total_rejected: 0,
        }
    }

    /// Add time spent in `state` before leaving it.
    pub fn record_state_duration(&mut self, state: CircuitState, seconds: f64) {
        *self.state_durations.entry(state).or_insert(0.0) += seconds.max(0.0);
    }

    pub fn record_failure(&mut self, at: DateTime<Utc>) {
        self.total_failures += 1;
        self.failure_times.push_back(at);
        self.prune(at);
    }

    pub fn record_success(&mut self) {
        self.total_successes += 1;
    }

    pub fn record_rejected(&mut self) {
        self.total_rejected += 1;
    }

    /// Seconds between a trip and the following close.
    pub fn record_recovery(&mut self, seconds: f64) {
        self.recovery_total_secs += seconds.max(0.0);
        self.recoveries += 1;
    }

    /// Failures per minute over the metric window.
    pub fn error_density(&self, now: DateTime<Utc>) -> f64 {
        let window_secs = self.window.num_seconds();
        if window_secs <= 0 {
            return 0.0;
        }
        let cutoff = now - self.window;
        let recent = self.failure_times.iter().filter(|t| **t > cutoff).count();
        (recent as f64 * 60.0) / window_secs as f64
    }

    pub fn avg_recovery_time(&self) -> Option<f64> {
        (self.recoveries > 0).then(|| self.recovery_total_secs / self.recoveries as f64)
    }

    /// Accumulated seconds per state, with the current stretch in `current`
    /// counted up to `now`.
    pub fn state_durations(
        &self,
        current: CircuitState,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> HashMap<CircuitState, f64> {
        let mut durations = self.state_durations.clone();
        *durations.entry(current).or_insert(0.0) += seconds_between(since, now);
        durations
    }

    pub fn total_successes(&self) -> u64 {
        self.total_successes
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }

    pub fn total_rejected(&self) -> u64 {
        self.total_rejected
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        while self.failure_times.front().is_some_and(|t| *t <= cutoff) {
            self.failure_times.pop_front();
        }
    }
}

/// Non-negative seconds from `from` to `to`.
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds().max(0) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_density_counts_window_only() {
        let mut metrics = ReliabilityMetrics::new(Duration::seconds(600));
        let now = Utc::now();

        metrics.record_failure(now - Duration::seconds(700));
        metrics.record_failure(now - Duration::seconds(60));
        metrics.record_failure(now);

        // two failures inside a ten minute window
        assert!((metrics.error_density(now) - 0.2).abs() < 1e-9);
        assert_eq!(metrics.total_failures(), 3);
    }

    #[test]
    fn test_avg_recovery_time() {
        let mut metrics = ReliabilityMetrics::new(Duration::seconds(3600));
        assert!(metrics.avg_recovery_time().is_none());

        metrics.record_recovery(10.0);
        metrics.record_recovery(30.0);
        assert_eq!(metrics.avg_recovery_time(), Some(20.0));
    }

    #[test]
    fn test_recovery_average_over_many_trips() {
        let mut metrics = ReliabilityMetrics::new(Duration::seconds(3600));
        for i in 0..10_000 {
            metrics.record_recovery(if i % 2 == 0 { 1.0 } else { 3.0 });
        }
        metrics.record_recovery(-5.0);

        assert_eq!(metrics.recoveries, 10_001);
        let avg = metrics.avg_recovery_time().unwrap();
        assert!((avg - 20_000.0 / 10_001.0).abs() < 1e-9);
    }

    #[test]
    fn test_state_durations_include_current_stretch() {
        let mut metrics = ReliabilityMetrics::new(Duration::seconds(3600));
        let now = Utc::now();
        metrics.record_state_duration(CircuitState::Closed, 12.0);

        let durations = metrics.state_durations(CircuitState::Open, now - Duration::seconds(5), now);
        assert_eq!(durations[&CircuitState::Closed], 12.0);
        assert_eq!(durations[&CircuitState::Open], 5.0);
    }
}
