//! `sentinel route`: pick the producer that must correct a set of errors.

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

use crate::cli::commands::{render_errors, render_feedback};
use crate::cli::display::{output, CommandOutput};
use crate::cli::input::read_document;
use crate::domain::models::{FeedbackPayload, ResponsibleParty, ValidationError};
use crate::services::{route, OwnershipTally};

#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Errors file: a list of errors, or an object with an `errors` list
    /// such as saved `validate --json` output
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct RouteOutput {
    pub error_count: usize,
    pub flow_owned: usize,
    pub structure_owned: usize,
    pub responsible: Option<ResponsibleParty>,
    pub feedback: Option<FeedbackPayload>,
}

impl RouteOutput {
    pub fn from_errors(errors: &[ValidationError]) -> Self {
        let tally = OwnershipTally::of(errors);
        let feedback = route(errors);
        Self {
            error_count: errors.len(),
            flow_owned: tally.flow,
            structure_owned: tally.structure,
            responsible: feedback.as_ref().map(|f| f.agent_type),
            feedback,
        }
    }
}

impl CommandOutput for RouteOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!(
                "{} errors: {} flow-owned, {} structure-owned",
                self.error_count, self.flow_owned, self.structure_owned
            ),
            render_feedback(self.feedback.as_ref()),
        ];
        if let Some(feedback) = &self.feedback {
            lines.push(render_errors(&feedback.errors));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RouteArgs, json_mode: bool) -> Result<()> {
    let document = read_document(&args.file)?;
    let errors = errors_from_document(document)
        .with_context(|| format!("no validation errors found in {}", args.file.display()))?;

    output(&RouteOutput::from_errors(&errors), json_mode);
    Ok(())
}

/// Accepts a bare list, `{"errors": [...]}`, or `validate --json` output
/// whose errors live under `stages[].errors`.
pub fn errors_from_document(document: Value) -> Result<Vec<ValidationError>> {
    match document {
        Value::Array(_) => Ok(serde_json::from_value(document)?),
        Value::Object(mut map) => {
            if let Some(errors) = map.remove("errors") {
                return Ok(serde_json::from_value(errors)?);
            }
            if let Some(Value::Array(stages)) = map.remove("stages") {
                let mut errors = Vec::new();
                for mut stage in stages {
                    if let Some(stage_errors) = stage.get_mut("errors").map(Value::take) {
                        errors.extend(serde_json::from_value::<Vec<ValidationError>>(stage_errors)?);
                    }
                }
                return Ok(errors);
            }
            bail!("expected an `errors` or `stages` key")
        }
        _ => bail!("expected a list of errors or an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_route_structure_majority() {
        let errors = errors_from_document(json!([
            {"error_type": "dependency_cycle", "message": "cycle"},
            {"error_type": "undefined_dependency", "message": "undefined"},
            {"error_type": "self_reference", "message": "self"}
        ]))
        .unwrap();

        let output = RouteOutput::from_errors(&errors);
        assert_eq!(output.structure_owned, 2);
        assert_eq!(output.flow_owned, 1);
        assert_eq!(output.responsible, Some(ResponsibleParty::Structure));
        assert_eq!(output.feedback.unwrap().error_count, 2);
    }

    #[test]
    fn test_unowned_errors_route_nowhere() {
        let errors = errors_from_document(json!({"errors": [
            {"error_type": "missing_field", "message": "Flow missing required field: source"}
        ]}))
        .unwrap();

        let output = RouteOutput::from_errors(&errors);
        assert_eq!(output.responsible, None);
        assert!(output.feedback.is_none());
    }

    #[test]
    fn test_reads_validate_output_stages() {
        let errors = errors_from_document(json!({
            "valid": false,
            "stages": [
                {"stage": "data_flow", "valid": true, "errors": []},
                {"stage": "cross_consistency", "valid": false, "errors": [
                    {"error_type": "missing_structural_dependency", "message": "m",
                     "component": "B", "flow_source": "A"}
                ]}
            ]
        }))
        .unwrap();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_rejects_scalar_document() {
        assert!(errors_from_document(json!(42)).is_err());
    }
}
