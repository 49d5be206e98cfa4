//! `sentinel breakers`: inspect and control persisted circuit breakers.
//!
//! Every invocation opens the configured database, restores the stored
//! breakers into a fresh registry, applies the command, and writes the
//! result back.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use crate::adapters::sqlite::{initialize_configured_database, SqliteBreakerStateStore};
use crate::cli::display::{
    action_success, colorize_health, colorize_state, label, list_table, output, render_list,
    section_header, truncate, CommandOutput,
};
use crate::domain::models::{
    BreakerStatus, CircuitState, Config, HealthStatus, StateChangeEvent, SummaryEntry,
};
use crate::services::circuit_breaker::seconds;
use crate::services::{
    BreakerMonitor, CircuitBreakerRegistry, EventBus, MonitorConfig, MonitorEvent,
    STATE_CHANGED_EVENT,
};

#[derive(Args, Debug)]
pub struct BreakersArgs {
    #[command(subcommand)]
    pub command: BreakerCommands,
}

#[derive(Subcommand, Debug)]
pub enum BreakerCommands {
    /// List every stored breaker
    List,
    /// Show one breaker in detail
    Show {
        /// Breaker name
        name: String,
    },
    /// Register a breaker, optionally under a parent
    Register {
        /// Breaker name
        name: String,
        /// Parent breaker; tripping it trips this one
        #[arg(long)]
        parent: Option<String>,
        /// Component whose configured thresholds apply
        #[arg(long)]
        component: Option<String>,
    },
    /// Force a breaker open
    Trip {
        /// Breaker name
        name: String,
        /// Reason recorded with the transition
        #[arg(long, default_value = "manual_trip")]
        reason: String,
    },
    /// Force a breaker closed
    Reset {
        /// Breaker name
        name: String,
    },
    /// Close every breaker
    ResetAll,
    /// Remove a breaker and its stored state
    Remove {
        /// Breaker name
        name: String,
    },
    /// Run the recovery monitor in the foreground until interrupted
    Watch {
        /// Seconds between sweeps (defaults to the configured interval)
        #[arg(long)]
        interval: Option<u64>,
        /// Stop after this many sweeps
        #[arg(long)]
        cycles: Option<u64>,
    },
}

#[derive(Debug, Serialize)]
pub struct BreakerRowOutput {
    pub name: String,
    pub state: Option<CircuitState>,
    pub health: Option<HealthStatus>,
    pub failure_count: u32,
    pub trip_count: u32,
    pub parent: Option<String>,
    pub last_state_change: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BreakerRowOutput {
    fn from_entry(name: String, entry: &SummaryEntry) -> Self {
        match entry {
            SummaryEntry::Status(status) => Self {
                name,
                state: Some(status.state),
                health: Some(status.health),
                failure_count: status.failure_count,
                trip_count: status.trip_count,
                parent: status.parent.clone(),
                last_state_change: Some(status.last_state_change.to_rfc3339()),
                error: None,
            },
            SummaryEntry::Error { error } => Self {
                name,
                state: None,
                health: None,
                failure_count: 0,
                trip_count: 0,
                parent: None,
                last_state_change: None,
                error: Some(error.clone()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BreakerListOutput {
    pub breakers: Vec<BreakerRowOutput>,
    pub total: usize,
}

impl CommandOutput for BreakerListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["name", "state", "health", "failures", "trips", "parent"]);
        for row in &self.breakers {
            let (state, health) = match (row.state, row.health) {
                (Some(state), Some(health)) => (
                    colorize_state(state).to_string(),
                    colorize_health(health).to_string(),
                ),
                _ => ("-".to_string(), truncate(row.error.as_deref().unwrap_or("unreadable"), 30)),
            };
            table.add_row(vec![
                truncate(&row.name, 40),
                state,
                health,
                row.failure_count.to_string(),
                row.trip_count.to_string(),
                row.parent.clone().unwrap_or_else(|| "-".to_string()),
            ]);
        }
        render_list("breaker", &table, self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct BreakerDetailOutput {
    pub name: String,
    pub children: Vec<String>,
    #[serde(flatten)]
    pub status: BreakerStatus,
}

impl CommandOutput for BreakerDetailOutput {
    fn to_human(&self) -> String {
        let status = &self.status;
        let optional_time = |t: Option<chrono::DateTime<chrono::Utc>>| {
            t.map_or_else(|| "-".to_string(), |t| t.to_rfc3339())
        };

        let mut lines = vec![
            format!("{} {}", label("Breaker"), self.name),
            format!("{} {}", label("State"), colorize_state(status.state)),
            format!("{} {}", label("Health"), colorize_health(status.health)),
            format!("{} {}", label("Failures"), status.failure_count),
            format!("{} {}", label("Last failure"), optional_time(status.last_failure)),
            format!("{} {}", label("Last state change"), status.last_state_change.to_rfc3339()),
            format!("{} {}", label("Trips"), status.trip_count),
            format!("{} {}", label("Last trip"), optional_time(status.last_trip)),
            format!("{} {}", label("Last reset"), optional_time(status.last_reset)),
            format!("{} {}", label("Parent"), status.parent.as_deref().unwrap_or("-")),
        ];
        if !self.children.is_empty() {
            lines.push(format!("{} {}", label("Children"), self.children.join(", ")));
        }
        if let Some(error) = &status.last_error {
            lines.push(format!("{} {}", label("Last error"), error));
        }

        lines.push(section_header("Metrics"));
        lines.push(format!("{} {:.2}/min", label("Error density"), status.error_density));
        if let Some(avg) = status.avg_recovery_time_secs {
            lines.push(format!("{} {avg:.1}s", label("Avg recovery")));
        }
        let mut durations: Vec<_> = status.state_durations_secs.iter().collect();
        durations.sort_by_key(|(state, _)| state.as_str());
        for (state, secs) in durations {
            lines.push(format!("{} {secs:.1}s", label(&format!("Time {state}"))));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct BreakerActionOutput {
    pub success: bool,
    pub changed: bool,
    pub message: String,
}

impl CommandOutput for BreakerActionOutput {
    fn to_human(&self) -> String {
        action_success(&self.message)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct WatchSummaryOutput {
    pub runs: u64,
    pub half_opened: u64,
    pub persist_failures: u64,
}

impl CommandOutput for WatchSummaryOutput {
    fn to_human(&self) -> String {
        action_success(&format!(
            "Monitor stopped after {} sweep(s); {} breaker(s) half-opened",
            self.runs, self.half_opened
        ))
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Registry backed by the configured database, with stored breakers restored.
pub async fn open_registry(config: &Config) -> Result<(Arc<CircuitBreakerRegistry>, Arc<EventBus>)> {
    let pool = initialize_configured_database(&config.database)
        .await
        .with_context(|| format!("Failed to open breaker database at {}", config.database.path))?;

    let bus = Arc::new(EventBus::new(&config.event_bus));
    let registry = CircuitBreakerRegistry::new(bus.clone())
        .with_store(Arc::new(SqliteBreakerStateStore::new(pool)));
    registry.configure(
        &config.circuit_breakers,
        seconds(config.monitoring.metric_window_secs),
    );
    registry
        .load_state()
        .await
        .context("Failed to restore stored breakers")?;

    Ok((Arc::new(registry), bus))
}

pub async fn execute(args: BreakersArgs, config: &Config, json_mode: bool) -> Result<()> {
    let (registry, bus) = open_registry(config).await?;

    match args.command {
        BreakerCommands::List => {
            output(&list_output(&registry), json_mode);
        }

        BreakerCommands::Show { name } => {
            let breaker = registry
                .get(&name)
                .with_context(|| format!("Circuit breaker not found: {name}"))?;
            let out = BreakerDetailOutput {
                children: breaker.children_names(),
                status: breaker.status()?,
                name,
            };
            output(&out, json_mode);
        }

        BreakerCommands::Register {
            name,
            parent,
            component,
        } => {
            let existed = registry.get(&name).is_some();
            match component {
                Some(component) => registry.register_for_component(&name, &component, parent.as_deref()),
                None => registry.register(&name, parent.as_deref()),
            };
            registry.save_state(None).await?;

            let out = BreakerActionOutput {
                success: true,
                changed: !existed,
                message: if existed {
                    format!("Circuit breaker already registered: {name}")
                } else {
                    format!("Registered circuit breaker: {name}")
                },
            };
            output(&out, json_mode);
        }

        BreakerCommands::Trip { name, reason } => {
            let changed = registry.trip(&name, &reason)?;
            registry.save_state(None).await?;

            let out = BreakerActionOutput {
                success: true,
                changed,
                message: if changed {
                    format!("Circuit breaker opened: {name}")
                } else {
                    format!("Circuit breaker already open: {name}")
                },
            };
            output(&out, json_mode);
        }

        BreakerCommands::Reset { name } => {
            let changed = registry.reset(&name)?;
            registry.save_state(Some(&name)).await?;

            let out = BreakerActionOutput {
                success: true,
                changed,
                message: if changed {
                    format!("Circuit breaker closed: {name}")
                } else {
                    format!("Circuit breaker already closed: {name}")
                },
            };
            output(&out, json_mode);
        }

        BreakerCommands::ResetAll => {
            let reset = registry.reset_all();
            registry.save_state(None).await?;

            let out = BreakerActionOutput {
                success: true,
                changed: reset > 0,
                message: format!("Closed {reset} circuit breaker(s)"),
            };
            output(&out, json_mode);
        }

        BreakerCommands::Remove { name } => {
            let removed = registry.unregister(&name);
            let deleted = registry.delete_state(&name).await?;
            if !removed && !deleted {
                anyhow::bail!("Circuit breaker not found: {name}");
            }
            // parents and children dropped their links to it
            registry.save_state(None).await?;

            let out = BreakerActionOutput {
                success: true,
                changed: true,
                message: format!("Removed circuit breaker: {name}"),
            };
            output(&out, json_mode);
        }

        BreakerCommands::Watch { interval, cycles } => {
            let summary = watch(config, registry, &bus, interval, cycles, json_mode).await?;
            output(&summary, json_mode);
        }
    }

    Ok(())
}

fn list_output(registry: &CircuitBreakerRegistry) -> BreakerListOutput {
    let breakers: Vec<BreakerRowOutput> = registry
        .summary()
        .into_iter()
        .map(|(name, entry)| BreakerRowOutput::from_entry(name, &entry))
        .collect();
    BreakerListOutput {
        total: breakers.len(),
        breakers,
    }
}

async fn watch(
    config: &Config,
    registry: Arc<CircuitBreakerRegistry>,
    bus: &EventBus,
    interval: Option<u64>,
    cycles: Option<u64>,
    json_mode: bool,
) -> Result<WatchSummaryOutput> {
    let mut monitor_config = MonitorConfig::from(&config.monitoring);
    if let Some(secs) = interval {
        monitor_config.check_interval = Duration::from_secs(secs.max(1));
    }
    monitor_config.persist_each_cycle = true;

    let mut transitions = bus.subscribe();
    let (handle, mut events) = BreakerMonitor::new(registry, monitor_config).start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted; stopping breaker monitor");
                break;
            }
            event = events.recv() => match event {
                Some(MonitorEvent::CheckCompleted { run_number, .. }) => {
                    if cycles.is_some_and(|limit| run_number >= limit) {
                        break;
                    }
                }
                Some(MonitorEvent::PersistFailed { run_number, error }) => {
                    tracing::warn!(run_number, error = %error, "Breaker state not persisted");
                }
                Some(MonitorEvent::Stopped { reason }) => {
                    tracing::warn!(reason = ?reason, "Breaker monitor stopped on its own");
                    break;
                }
                Some(MonitorEvent::Started) => {}
                None => break,
            },
            received = transitions.recv() => match received {
                Ok(event) if event.event_type == STATE_CHANGED_EVENT => {
                    print_transition(event.payload, json_mode);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Missed breaker transitions");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    let status = handle.stop_and_wait().await;
    Ok(WatchSummaryOutput {
        runs: status.total_runs,
        half_opened: status.total_half_opened,
        persist_failures: status.persist_failures,
    })
}

fn print_transition(payload: serde_json::Value, json_mode: bool) {
    if json_mode {
        println!("{payload}");
        return;
    }
    match serde_json::from_value::<StateChangeEvent>(payload) {
        Ok(change) => println!(
            "{} {}: {} -> {} ({})",
            change.timestamp.format("%H:%M:%S"),
            change.breaker_name,
            colorize_state(change.old_state),
            colorize_state(change.new_state),
            change.reason
        ),
        Err(e) => tracing::debug!(error = %e, "Unrecognized state change payload"),
    }
}
