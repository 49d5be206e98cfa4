//! End-to-end validation scenarios through the stateful validator.

mod common;

use std::sync::Arc;

use common::{component, flow_doc, structure_doc};
use sentinel::domain::models::{
    Component, DataFlow, ErrorKind, FlowGraph, ResponsibleParty, StructureGraph,
    ValidationError, ValidationEventType, ValidationStatus,
};
use sentinel::services::{ChannelEmitter, DependencyValidator, VALIDATION_COMPLETED_EVENT};

fn chain_structure(b_requires: &[&str]) -> serde_json::Value {
    structure_doc(vec![
        component("A", 1, &[]),
        component("B", 2, b_requires),
        component("C", 3, &["B"]),
    ])
}

#[test]
fn test_consistent_chain_passes_every_stage() {
    let validator = DependencyValidator::new();

    assert!(validator.validate_flow(&flow_doc(&[("A", "B"), ("B", "C")])).valid);
    assert!(validator.validate_structure(&chain_structure(&["A"])).valid);

    let cross = validator.validate_cross_consistency(None, None);
    assert!(cross.valid, "unexpected errors: {:?}", cross.errors);

    let summary = validator.summary();
    assert!(summary.data_flow_validated);
    assert!(summary.structural_breakdown_validated);
    assert!(summary.cross_consistency_validated);
    assert_eq!(summary.overall_status, ValidationStatus::Success);
    assert_eq!(summary.history.len(), 3);
}

#[test]
fn test_under_declared_dependency_is_reported_and_routed() {
    let validator = DependencyValidator::new();
    validator.validate_flow(&flow_doc(&[("A", "B"), ("B", "C")]));
    assert!(validator.validate_structure(&chain_structure(&[])).valid);

    let cross = validator.validate_cross_consistency(None, None);
    assert!(!cross.valid);
    assert_eq!(cross.errors.len(), 1);
    let error = &cross.errors[0];
    assert_eq!(error.kind, ErrorKind::MissingStructuralDependency);
    assert_eq!(error.context.component_name.as_deref(), Some("B"));
    assert_eq!(error.context.data_flow_dependency.as_deref(), Some("A"));

    assert_eq!(
        validator.determine_responsible_party(&cross.errors),
        Some(ResponsibleParty::Structure)
    );
    let feedback = validator.prepare_feedback(ResponsibleParty::Structure, &cross.errors);
    assert!(feedback.correction_required);
    assert_eq!(feedback.error_count, 1);

    assert_eq!(validator.summary().overall_status, ValidationStatus::Failure);
}

#[test]
fn test_two_node_flow_cycle() {
    let validator = DependencyValidator::new();
    let report = validator.validate_flow(&flow_doc(&[("A", "B"), ("B", "A")]));

    assert!(!report.valid);
    let cycles: Vec<&ValidationError> = report
        .errors
        .iter()
        .filter(|e| e.kind == ErrorKind::DataFlowCycle)
        .collect();
    assert_eq!(cycles.len(), 1);
    let mut nodes = vec![
        cycles[0].context.cycle_node.clone().unwrap(),
        cycles[0].context.cycle_next.clone().unwrap(),
    ];
    nodes.sort();
    assert_eq!(nodes, vec!["A", "B"]);
}

#[test]
fn test_external_edges_do_not_form_cycles() {
    let validator = DependencyValidator::new();
    let report = validator.validate_flow(&flow_doc(&[
        ("external", "A"),
        ("A", "external"),
        ("A", "B"),
    ]));
    assert!(report.valid, "unexpected errors: {:?}", report.errors);
}

#[test]
fn test_malformed_flow_entries_are_skipped_not_fatal() {
    let validator = DependencyValidator::new();
    let document = serde_json::json!({"data_flows": [
        {"source": "A", "destination": "B", "data_type": "x"},
        {"source": "B"},
        {"source": "C", "destination": "C", "data_type": "x"}
    ]});

    let report = validator.validate_flow(&document);
    assert!(!report.valid);
    assert_eq!(report.count(ErrorKind::MissingField), 2);
    assert_eq!(report.count(ErrorKind::SelfReference), 1);
    assert_eq!(validator.cached_flow().unwrap().len(), 2);
}

#[test]
fn test_shape_errors_leave_session_untouched() {
    let validator = DependencyValidator::new();

    let report = validator.validate_flow(&serde_json::json!({"flows": []}));
    assert_eq!(report.errors[0].kind, ErrorKind::MissingDataFlows);
    let report = validator.validate_structure(&serde_json::json!("not a document"));
    assert_eq!(report.errors[0].kind, ErrorKind::InvalidStructureFormat);

    assert!(validator.history().is_empty());
    assert!(validator.cached_flow().is_none());

    let cross = validator.validate_cross_consistency(None, None);
    assert_eq!(cross.errors[0].kind, ErrorKind::MissingValidationData);
    assert!(validator.history().is_empty());
}

#[test]
fn test_explicit_graphs_override_cache_for_one_check() {
    let validator = DependencyValidator::new();
    validator.validate_flow(&flow_doc(&[("A", "B")]));
    validator.validate_structure(&structure_doc(vec![
        component("A", 1, &[]),
        component("B", 2, &["A"]),
    ]));

    let other_flow = FlowGraph::new(vec![DataFlow::new("A", "Z", "payload")]);
    let other_structure = StructureGraph::new(vec![
        Component::new("A", 1),
        Component::new("Z", 2),
    ]);
    let report = validator.validate_cross_consistency(Some(&other_flow), Some(&other_structure));
    assert!(report.has(ErrorKind::MissingStructuralDependency));

    assert_eq!(validator.cached_flow().unwrap().data_flows[0].destination, "B");
    assert!(validator.validate_cross_consistency(None, None).valid);
}

#[test]
fn test_structure_forward_reference_only_allowed_for_root() {
    let validator = DependencyValidator::new();
    let report = validator.validate_structure(&structure_doc(vec![
        component("A", 1, &["B"]),
        component("B", 2, &["C"]),
        component("C", 3, &[]),
    ]));

    let undefined: Vec<_> = report
        .errors
        .iter()
        .filter(|e| e.kind == ErrorKind::UndefinedDependency)
        .collect();
    assert_eq!(undefined.len(), 1);
    assert_eq!(undefined[0].context.component_name.as_deref(), Some("B"));
}

#[test]
fn test_completed_validations_are_published() {
    let (emitter, mut events) = ChannelEmitter::new(16);
    let validator = DependencyValidator::new().with_emitter(Arc::new(emitter));

    validator.validate_flow(&flow_doc(&[("A", "B")]));
    validator.validate_flow(&serde_json::json!([]));

    let event = events.try_recv().unwrap();
    assert_eq!(event.event_type, VALIDATION_COMPLETED_EVENT);
    assert!(events.try_recv().is_err());

    let history = validator.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].event_type, ValidationEventType::DataFlow);
}

#[test]
fn test_reset_clears_session() {
    let validator = DependencyValidator::new();
    validator.validate_flow(&flow_doc(&[("A", "B")]));
    validator.reset();

    let summary = validator.summary();
    assert!(!summary.data_flow_validated);
    assert!(summary.history.is_empty());
    assert!(summary.latest_validation_time.is_none());
    assert_eq!(summary.overall_status, ValidationStatus::Success);
}
