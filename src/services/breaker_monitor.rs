//! Background breaker monitor.
//!
//! Sweeps the registry on a fixed interval so open breakers whose cooldown
//! has elapsed move to half-open even when nobody is calling them, and
//! optionally persists breaker state each cycle and on stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::domain::models::MonitoringConfig;
use crate::services::breaker_registry::CircuitBreakerRegistry;

/// Configuration for the breaker monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval between `check_all` sweeps.
    pub check_interval: Duration,
    /// Persist all breakers after every sweep.
    pub persist_each_cycle: bool,
    /// Persist all breakers when the monitor stops.
    pub persist_on_stop: bool,
    /// Consecutive persistence failures before giving up.
    pub max_consecutive_failures: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            persist_each_cycle: false,
            persist_on_stop: true,
            max_consecutive_failures: 5,
        }
    }
}

impl MonitorConfig {
    pub fn with_interval(check_interval: Duration) -> Self {
        Self {
            check_interval,
            ..Default::default()
        }
    }
}

impl From<&MonitoringConfig> for MonitorConfig {
    fn from(config: &MonitoringConfig) -> Self {
        Self {
            check_interval: Duration::from_secs(config.check_interval_secs),
            persist_on_stop: config.persist_on_stop,
            ..Default::default()
        }
    }
}

/// Event emitted by the monitor.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    Started,
    CheckCompleted {
        run_number: u64,
        half_opened: Vec<String>,
    },
    PersistFailed {
        run_number: u64,
        error: String,
    },
    Stopped {
        reason: StopReason,
    },
}

/// Reason the monitor stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    TooManyFailures,
}

#[derive(Debug, Clone, Default)]
pub struct MonitorStatus {
    pub running: bool,
    pub total_runs: u64,
    pub total_half_opened: u64,
    pub persist_failures: u64,
    pub last_run: Option<Instant>,
}

/// Handle to a running monitor.
pub struct MonitorHandle {
    stop_flag: Arc<AtomicBool>,
    wake: Arc<Notify>,
    status: Arc<RwLock<MonitorStatus>>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Request the monitor to stop after its current sweep.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }

    pub async fn status(&self) -> MonitorStatus {
        self.status.read().await.clone()
    }

    /// Stop and wait for the final persist to finish.
    pub async fn stop_and_wait(self) -> MonitorStatus {
        self.stop();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Breaker monitor task failed");
        }
        self.status.read().await.clone()
    }
}

/// Periodically calls `check_all` on a registry.
pub struct BreakerMonitor {
    registry: Arc<CircuitBreakerRegistry>,
    config: MonitorConfig,
    status: Arc<RwLock<MonitorStatus>>,
    stop_flag: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl BreakerMonitor {
    pub fn new(registry: Arc<CircuitBreakerRegistry>, config: MonitorConfig) -> Self {
        Self {
            registry,
            config,
            status: Arc::new(RwLock::new(MonitorStatus::default())),
            stop_flag: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Spawn the monitor loop on the current runtime.
    pub fn start(self) -> (MonitorHandle, mpsc::Receiver<MonitorEvent>) {
        let (tx, rx) = mpsc::channel(100);
        let stop_flag = Arc::clone(&self.stop_flag);
        let wake = Arc::clone(&self.wake);
        let status = Arc::clone(&self.status);

        let task = tokio::spawn(async move {
            self.run_loop(tx).await;
        });

        (
            MonitorHandle {
                stop_flag,
                wake,
                status,
                task,
            },
            rx,
        )
    }

    /// One sweep without the loop. Returns the breakers that half-opened.
    pub fn run_once(&self) -> Vec<String> {
        self.registry.check_all()
    }

    async fn run_loop(self, tx: mpsc::Sender<MonitorEvent>) {
        self.status.write().await.running = true;
        send(&tx, MonitorEvent::Started);
        tracing::info!(interval_ms = self.config.check_interval.as_millis() as u64, "Breaker monitor started");

        let mut timer = interval(self.config.check_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut consecutive_failures = 0u32;
        let mut reason = StopReason::Requested;

        loop {
            tokio::select! {
                _ = timer.tick() => {}
                () = self.wake.notified() => {}
            }
            if self.stop_flag.load(Ordering::Acquire) {
                break;
            }

            self.run_cycle(&tx, &mut consecutive_failures).await;

            if consecutive_failures >= self.config.max_consecutive_failures {
                tracing::error!(failures = consecutive_failures, "Breaker monitor giving up");
                reason = StopReason::TooManyFailures;
                break;
            }
        }

        if self.config.persist_on_stop {
            if let Err(e) = self.registry.save_state(None).await {
                tracing::warn!(error = %e, "Failed to persist breakers on monitor stop");
            }
        }

        self.status.write().await.running = false;
        tracing::info!(reason = ?reason, "Breaker monitor stopped");
        send(&tx, MonitorEvent::Stopped { reason });
    }

    async fn run_cycle(&self, tx: &mpsc::Sender<MonitorEvent>, consecutive_failures: &mut u32) {
        let run_number = {
            let mut status = self.status.write().await;
            status.total_runs += 1;
            status.total_runs
        };

        let half_opened = self.registry.check_all();
        if !half_opened.is_empty() {
            tracing::info!(run_number, breakers = ?half_opened, "Breakers moved to half-open");
        }

        {
            let mut status = self.status.write().await;
            status.total_half_opened += half_opened.len() as u64;
            status.last_run = Some(Instant::now());
        }
        send(
            tx,
            MonitorEvent::CheckCompleted {
                run_number,
                half_opened,
            },
        );

        if self.config.persist_each_cycle {
            match self.registry.save_state(None).await {
                Ok(_) => *consecutive_failures = 0,
                Err(e) => {
                    *consecutive_failures += 1;
                    self.status.write().await.persist_failures += 1;
                    send(
                        tx,
                        MonitorEvent::PersistFailed {
                            run_number,
                            error: e.to_string(),
                        },
                    );
                }
            }
        }
    }
}

/// Drop the event if nobody is draining the channel.
fn send(tx: &mpsc::Sender<MonitorEvent>, event: MonitorEvent) {
    if let Err(e) = tx.try_send(event) {
        tracing::debug!(error = %e, "Monitor event not delivered");
    }
}
