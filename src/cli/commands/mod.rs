//! CLI command implementations.

pub mod breakers;
pub mod route;
pub mod validate;

use console::style;

use crate::domain::models::{FeedbackPayload, ValidationError};

/// Indented one-line-per-error listing shared by `validate` and `route`.
pub(crate) fn render_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("    {} {}", style(format!("[{}]", e.kind)).dim(), e.message))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn render_feedback(feedback: Option<&FeedbackPayload>) -> String {
    match feedback {
        Some(feedback) => format!(
            "Correction required from {} ({} error{})",
            style(feedback.agent_type).bold(),
            feedback.error_count,
            if feedback.error_count == 1 { "" } else { "s" }
        ),
        None => "No producer owns these errors".to_string(),
    }
}
