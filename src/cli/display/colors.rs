//! State and status coloring for CLI output.
//!
//! `console` drops styling on its own when stdout is not a terminal or
//! `NO_COLOR` is set.

use console::{style, StyledObject};

use crate::domain::models::{CircuitState, HealthStatus, ValidationStatus};

/// Closed = green, half-open = yellow, open = red bold.
pub fn colorize_state(state: CircuitState) -> StyledObject<&'static str> {
    match state {
        CircuitState::Closed => style(state.as_str()).green(),
        CircuitState::HalfOpen => style(state.as_str()).yellow(),
        CircuitState::Open => style(state.as_str()).red().bold(),
    }
}

pub fn colorize_health(health: HealthStatus) -> StyledObject<String> {
    let text = health.to_string();
    match health {
        HealthStatus::Healthy => style(text).green(),
        HealthStatus::Degraded => style(text).yellow(),
        HealthStatus::Critical => style(text).red().bold(),
    }
}

pub fn colorize_validation(status: ValidationStatus) -> StyledObject<&'static str> {
    match status {
        ValidationStatus::Success => style("success").green().bold(),
        ValidationStatus::Failure => style("failure").red().bold(),
    }
}

/// Styled label for detail views (bold + dimmed colon).
pub fn label(name: &str) -> String {
    format!("{}{}", style(name).bold(), style(":").dim())
}

/// Section header with underline.
pub fn section_header(title: &str) -> String {
    format!("\n{}", style(title).bold().underlined())
}
