//! `sentinel validate`: check planning documents and report who must fix them.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::commands::{render_errors, render_feedback};
use crate::cli::display::{action_failure, action_success, output, CommandOutput};
use crate::cli::input::read_document;
use crate::cli::ReportedFailure;
use crate::domain::models::{
    FeedbackPayload, ValidationError, ValidationEventType, ValidationReport, ValidationSummary,
};
use crate::services::{route, DependencyValidator};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(subcommand)]
    pub command: ValidateCommands,
}

#[derive(Subcommand, Debug)]
pub enum ValidateCommands {
    /// Validate a data flow document (JSON or YAML, `-` for stdin)
    Flow {
        /// Path to the document
        file: PathBuf,
    },
    /// Validate a structure document (JSON or YAML, `-` for stdin)
    Structure {
        /// Path to the document
        file: PathBuf,
    },
    /// Validate both documents, then check they agree with each other
    All {
        /// Data flow document
        #[arg(long)]
        flow: PathBuf,
        /// Structure document
        #[arg(long)]
        structure: PathBuf,
    },
}

#[derive(Debug, Serialize)]
pub struct StageOutput {
    pub stage: ValidationEventType,
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl StageOutput {
    fn new(stage: ValidationEventType, report: ValidationReport) -> Self {
        let (valid, errors) = report.into_parts();
        Self {
            stage,
            valid,
            errors,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidateOutput {
    pub valid: bool,
    pub stages: Vec<StageOutput>,
    pub feedback: Option<FeedbackPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ValidationSummary>,
}

impl ValidateOutput {
    fn from_stages(stages: Vec<StageOutput>, summary: Option<ValidationSummary>) -> Self {
        let errors: Vec<ValidationError> = stages
            .iter()
            .flat_map(|s| s.errors.iter().cloned())
            .collect();
        Self {
            valid: stages.iter().all(|s| s.valid),
            feedback: route(&errors),
            stages,
            summary,
        }
    }
}

impl CommandOutput for ValidateOutput {
    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        for stage in &self.stages {
            if stage.valid {
                lines.push(action_success(&format!("{}: valid", stage.stage.as_str())));
            } else {
                lines.push(action_failure(&format!(
                    "{}: {} error{}",
                    stage.stage.as_str(),
                    stage.errors.len(),
                    if stage.errors.len() == 1 { "" } else { "s" }
                )));
                lines.push(render_errors(&stage.errors));
            }
        }
        if !self.valid {
            lines.push(String::new());
            lines.push(render_feedback(self.feedback.as_ref()));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ValidateArgs, json_mode: bool) -> Result<()> {
    let validator = DependencyValidator::new();

    let result = match args.command {
        ValidateCommands::Flow { file } => {
            let report = validator.validate_flow(&read_document(&file)?);
            ValidateOutput::from_stages(vec![StageOutput::new(ValidationEventType::DataFlow, report)], None)
        }
        ValidateCommands::Structure { file } => {
            let report = validator.validate_structure(&read_document(&file)?);
            ValidateOutput::from_stages(
                vec![StageOutput::new(ValidationEventType::StructuralBreakdown, report)],
                None,
            )
        }
        ValidateCommands::All { flow, structure } => {
            let flow_doc = read_document(&flow)?;
            let structure_doc = read_document(&structure)?;
            ValidateOutput::from_stages(validate_all(&validator, &flow_doc, &structure_doc), Some(validator.summary()))
        }
    };

    output(&result, json_mode);
    if result.valid {
        Ok(())
    } else {
        Err(ReportedFailure(1).into())
    }
}

/// Runs both document validations, then the cross-check when both
/// documents could be read as graphs.
pub fn validate_all(
    validator: &DependencyValidator,
    flow: &serde_json::Value,
    structure: &serde_json::Value,
) -> Vec<StageOutput> {
    let mut stages = vec![
        StageOutput::new(ValidationEventType::DataFlow, validator.validate_flow(flow)),
        StageOutput::new(
            ValidationEventType::StructuralBreakdown,
            validator.validate_structure(structure),
        ),
    ];

    if validator.cached_flow().is_some() && validator.cached_structure().is_some() {
        stages.push(StageOutput::new(
            ValidationEventType::CrossConsistency,
            validator.validate_cross_consistency(None, None),
        ));
    } else {
        tracing::info!("Skipping cross-consistency check; a document could not be read as a graph");
    }
    stages
}
