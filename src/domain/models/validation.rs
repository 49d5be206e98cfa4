//! Validation error taxonomy, validation events and correction feedback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a validation error, serialized as its `error_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidDataFlowStructure,
    MissingDataFlows,
    SelfReference,
    DuplicateFlow,
    DataFlowCycle,
    FlowInvalidSource,
    FlowInvalidDestination,
    MissingDataFlow,
    InvalidStructureFormat,
    MissingComponents,
    DuplicateComponentName,
    DuplicateSequenceNumber,
    UndefinedDependency,
    DependencyCycle,
    MissingStructuralDependency,
    MissingField,
    MissingValidationData,
    /// Any `error_type` this build does not know about.
    #[serde(other)]
    Unknown,
}

/// Error kinds the data-flow producer is responsible for.
pub const FLOW_OWNED: &[ErrorKind] = &[
    ErrorKind::InvalidDataFlowStructure,
    ErrorKind::MissingDataFlows,
    ErrorKind::SelfReference,
    ErrorKind::DuplicateFlow,
    ErrorKind::DataFlowCycle,
    ErrorKind::FlowInvalidSource,
    ErrorKind::FlowInvalidDestination,
    ErrorKind::MissingDataFlow,
];

/// Error kinds the structure producer is responsible for.
pub const STRUCTURE_OWNED: &[ErrorKind] = &[
    ErrorKind::InvalidStructureFormat,
    ErrorKind::MissingComponents,
    ErrorKind::DuplicateComponentName,
    ErrorKind::DuplicateSequenceNumber,
    ErrorKind::UndefinedDependency,
    ErrorKind::DependencyCycle,
    ErrorKind::MissingStructuralDependency,
];

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidDataFlowStructure => "invalid_data_flow_structure",
            Self::MissingDataFlows => "missing_data_flows",
            Self::SelfReference => "self_reference",
            Self::DuplicateFlow => "duplicate_flow",
            Self::DataFlowCycle => "data_flow_cycle",
            Self::FlowInvalidSource => "flow_invalid_source",
            Self::FlowInvalidDestination => "flow_invalid_destination",
            Self::MissingDataFlow => "missing_data_flow",
            Self::InvalidStructureFormat => "invalid_structure_format",
            Self::MissingComponents => "missing_components",
            Self::DuplicateComponentName => "duplicate_component_name",
            Self::DuplicateSequenceNumber => "duplicate_sequence_number",
            Self::UndefinedDependency => "undefined_dependency",
            Self::DependencyCycle => "dependency_cycle",
            Self::MissingStructuralDependency => "missing_structural_dependency",
            Self::MissingField => "missing_field",
            Self::MissingValidationData => "missing_validation_data",
            Self::Unknown => "unknown",
        }
    }

    /// The party expected to correct this kind of error, if any.
    pub fn owner(&self) -> Option<ResponsibleParty> {
        if FLOW_OWNED.contains(self) {
            Some(ResponsibleParty::Flow)
        } else if STRUCTURE_OWNED.contains(self) {
            Some(ResponsibleParty::Structure)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream producer that must be re-prompted to fix its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponsibleParty {
    Flow,
    Structure,
}

impl ResponsibleParty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flow => "flow",
            Self::Structure => "structure",
        }
    }

    pub fn owned_kinds(&self) -> &'static [ErrorKind] {
        match self {
            Self::Flow => FLOW_OWNED,
            Self::Structure => STRUCTURE_OWNED,
        }
    }
}

impl std::fmt::Display for ResponsibleParty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location and subject details attached to a validation error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_flow_dependency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structural_dependency: Option<String>,
}

/// A structured validation error. Validators return these, they never panic
/// or bail on malformed input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    #[serde(rename = "error_type")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(flatten)]
    pub context: ErrorContext,
}

impl ValidationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    pub fn invalid_data_flow_structure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidDataFlowStructure, message)
    }

    pub fn missing_data_flows() -> Self {
        Self::new(
            ErrorKind::MissingDataFlows,
            "Data flow must contain 'data_flows' key",
        )
    }

    pub fn missing_flow_field(flow_index: usize, field: &str) -> Self {
        Self::new(
            ErrorKind::MissingField,
            format!("Flow missing required field: {field}"),
        )
        .with_context(ErrorContext {
            flow_index: Some(flow_index),
            field: Some(field.to_string()),
            ..Default::default()
        })
    }

    pub fn malformed_flow_field(flow_index: usize, field: &str, expected: &str) -> Self {
        Self::new(
            ErrorKind::MissingField,
            format!("Flow field {field} must be {expected}"),
        )
        .with_context(ErrorContext {
            flow_index: Some(flow_index),
            field: Some(field.to_string()),
            ..Default::default()
        })
    }

    pub fn self_reference(flow_index: usize, source: &str) -> Self {
        Self::new(
            ErrorKind::SelfReference,
            format!("Flow cannot have same source and destination: {source}"),
        )
        .with_context(ErrorContext {
            flow_index: Some(flow_index),
            source: Some(source.to_string()),
            ..Default::default()
        })
    }

    pub fn duplicate_flow(flow_index: usize, source: &str, destination: &str) -> Self {
        Self::new(
            ErrorKind::DuplicateFlow,
            format!("Duplicate flow from {source} to {destination}"),
        )
        .with_context(ErrorContext {
            flow_index: Some(flow_index),
            source: Some(source.to_string()),
            destination: Some(destination.to_string()),
            ..Default::default()
        })
    }

    pub fn data_flow_cycle(node: &str, next: &str) -> Self {
        Self::new(
            ErrorKind::DataFlowCycle,
            format!("Cycle detected in data flow: {node} -> {next}"),
        )
        .with_context(ErrorContext {
            cycle_node: Some(node.to_string()),
            cycle_next: Some(next.to_string()),
            ..Default::default()
        })
    }

    pub fn invalid_structure_format(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidStructureFormat, message)
    }

    pub fn missing_components() -> Self {
        Self::new(
            ErrorKind::MissingComponents,
            "Structure must contain 'ordered_components' key",
        )
    }

    pub fn missing_component_field(component_index: usize, field: &str) -> Self {
        Self::new(
            ErrorKind::MissingField,
            format!("Component missing required field: {field}"),
        )
        .with_context(ErrorContext {
            component_index: Some(component_index),
            field: Some(field.to_string()),
            ..Default::default()
        })
    }

    pub fn malformed_component_field(component_index: usize, field: &str, expected: &str) -> Self {
        Self::new(
            ErrorKind::MissingField,
            format!("Component field {field} must be {expected}"),
        )
        .with_context(ErrorContext {
            component_index: Some(component_index),
            field: Some(field.to_string()),
            ..Default::default()
        })
    }

    pub fn duplicate_component_name(component_index: usize, name: &str) -> Self {
        Self::new(
            ErrorKind::DuplicateComponentName,
            format!("Duplicate component name: {name}"),
        )
        .with_context(ErrorContext {
            component_index: Some(component_index),
            name: Some(name.to_string()),
            ..Default::default()
        })
    }

    pub fn duplicate_sequence_number(component_index: usize, sequence_number: i64) -> Self {
        Self::new(
            ErrorKind::DuplicateSequenceNumber,
            format!("Duplicate sequence number: {sequence_number}"),
        )
        .with_context(ErrorContext {
            component_index: Some(component_index),
            sequence_number: Some(sequence_number),
            ..Default::default()
        })
    }

    pub fn undefined_dependency(component_index: usize, component: &str, dependency: &str) -> Self {
        Self::new(
            ErrorKind::UndefinedDependency,
            format!("Component {component} depends on undefined component: {dependency}"),
        )
        .with_context(ErrorContext {
            component_index: Some(component_index),
            component_name: Some(component.to_string()),
            dependency: Some(dependency.to_string()),
            ..Default::default()
        })
    }

    pub fn dependency_cycle(node: &str, next: &str) -> Self {
        Self::new(
            ErrorKind::DependencyCycle,
            format!("Cycle detected in component dependencies: {node} -> {next}"),
        )
        .with_context(ErrorContext {
            cycle_node: Some(node.to_string()),
            cycle_next: Some(next.to_string()),
            ..Default::default()
        })
    }

    pub fn missing_validation_data() -> Self {
        Self::new(
            ErrorKind::MissingValidationData,
            "Both data flow and structural breakdown must be provided for cross-validation",
        )
    }

    pub fn flow_invalid_source(flow_index: usize, source: &str) -> Self {
        Self::new(
            ErrorKind::FlowInvalidSource,
            format!("Flow references non-existent source component: {source}"),
        )
        .with_context(ErrorContext {
            flow_index: Some(flow_index),
            source: Some(source.to_string()),
            ..Default::default()
        })
    }

    pub fn flow_invalid_destination(flow_index: usize, destination: &str) -> Self {
        Self::new(
            ErrorKind::FlowInvalidDestination,
            format!("Flow references non-existent destination component: {destination}"),
        )
        .with_context(ErrorContext {
            flow_index: Some(flow_index),
            destination: Some(destination.to_string()),
            ..Default::default()
        })
    }

    pub fn missing_structural_dependency(component: &str, flow_source: &str) -> Self {
        Self::new(
            ErrorKind::MissingStructuralDependency,
            format!(
                "Component {component} has data flow from {flow_source} but missing structural dependency"
            ),
        )
        .with_context(ErrorContext {
            component_name: Some(component.to_string()),
            data_flow_dependency: Some(flow_source.to_string()),
            ..Default::default()
        })
    }

    pub fn missing_data_flow(component: &str, dependency: &str) -> Self {
        Self::new(
            ErrorKind::MissingDataFlow,
            format!("Component {component} depends on {dependency} but no data flow exists"),
        )
        .with_context(ErrorContext {
            component_name: Some(component.to_string()),
            structural_dependency: Some(dependency.to_string()),
            ..Default::default()
        })
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Result of one validation pass: a verdict and every error found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn single(error: ValidationError) -> Self {
        Self::from_errors(vec![error])
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }

    pub fn has(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    pub fn into_parts(self) -> (bool, Vec<ValidationError>) {
        (self.valid, self.errors)
    }
}

/// Which validation produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationEventType {
    DataFlow,
    StructuralBreakdown,
    CrossConsistency,
}

impl ValidationEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataFlow => "data_flow",
            Self::StructuralBreakdown => "structural_breakdown",
            Self::CrossConsistency => "cross_consistency",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Success,
    Failure,
}

/// Audit record of one validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationEvent {
    pub event_type: ValidationEventType,
    pub status: ValidationStatus,
    pub timestamp: DateTime<Utc>,
    pub errors: Vec<ValidationError>,
}

impl ValidationEvent {
    pub fn new(event_type: ValidationEventType, errors: Vec<ValidationError>) -> Self {
        let status = if errors.is_empty() {
            ValidationStatus::Success
        } else {
            ValidationStatus::Failure
        };
        Self {
            event_type,
            status,
            timestamp: Utc::now(),
            errors,
        }
    }
}

/// Correction request handed to the responsible producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackPayload {
    pub agent_type: ResponsibleParty,
    pub error_count: usize,
    pub errors: Vec<ValidationError>,
    pub timestamp: DateTime<Utc>,
    pub correction_required: bool,
}

/// Roll-up of everything validated in the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub data_flow_validated: bool,
    pub structural_breakdown_validated: bool,
    pub cross_consistency_validated: bool,
    pub history: Vec<ValidationEvent>,
    pub latest_validation_time: Option<DateTime<Utc>>,
    pub overall_status: ValidationStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_owned_kind_has_one_owner() {
        for kind in FLOW_OWNED {
            assert_eq!(kind.owner(), Some(ResponsibleParty::Flow));
            assert!(!STRUCTURE_OWNED.contains(kind));
        }
        for kind in STRUCTURE_OWNED {
            assert_eq!(kind.owner(), Some(ResponsibleParty::Structure));
        }
        assert_eq!(ErrorKind::MissingField.owner(), None);
        assert_eq!(ErrorKind::MissingValidationData.owner(), None);
    }

    #[test]
    fn test_error_serializes_flat() {
        let error = ValidationError::data_flow_cycle("A", "B");
        let value = serde_json::to_value(&error).unwrap();

        assert_eq!(value["error_type"], "data_flow_cycle");
        assert_eq!(value["cycle_node"], "A");
        assert_eq!(value["cycle_next"], "B");
        assert!(value.get("flow_index").is_none());
    }

    #[test]
    fn test_error_deserializes_unknown_kind() {
        let value = serde_json::json!({
            "error_type": "something_new",
            "message": "from a newer producer",
            "flow_index": 3
        });
        let error: ValidationError = serde_json::from_value(value).unwrap();

        assert_eq!(error.kind, ErrorKind::Unknown);
        assert_eq!(error.context.flow_index, Some(3));
        assert_eq!(error.kind.owner(), None);
    }

    #[test]
    fn test_report_verdict_follows_errors() {
        assert!(ValidationReport::from_errors(vec![]).is_valid());

        let report = ValidationReport::single(ValidationError::missing_data_flows());
        assert!(!report.is_valid());
        assert!(report.has(ErrorKind::MissingDataFlows));
        assert_eq!(report.count(ErrorKind::SelfReference), 0);
    }

    #[test]
    fn test_event_status_from_errors() {
        let ok = ValidationEvent::new(ValidationEventType::DataFlow, vec![]);
        assert_eq!(ok.status, ValidationStatus::Success);

        let failed = ValidationEvent::new(
            ValidationEventType::CrossConsistency,
            vec![ValidationError::missing_validation_data()],
        );
        assert_eq!(failed.status, ValidationStatus::Failure);
    }
}
