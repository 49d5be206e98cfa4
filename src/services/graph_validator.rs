//! Internal validation of the flow graph and the structure graph.
//!
//! Both validators are pure: they read the graph, collect every error they
//! can find and never stop at the first malformed entry. Cycle detection
//! reports one cycle, the first back-edge found, not every cycle.

use serde_json::Value;
use std::collections::HashSet;

use crate::domain::models::{
    Component, DataFlow, FlowGraph, StructureGraph, ValidationError, ValidationReport,
};
use crate::services::dependency_graph::DependencyGraph;

/// Validates a typed flow graph.
pub fn validate_flow_graph(graph: &FlowGraph) -> ValidationReport {
    ValidationReport::from_errors(flow_graph_errors(graph.data_flows.iter().enumerate()))
}

/// Validates a typed structure graph.
pub fn validate_structure_graph(structure: &StructureGraph) -> ValidationReport {
    ValidationReport::from_errors(structure_graph_errors(
        structure.ordered_components.iter().enumerate(),
    ))
}

/// Reads and validates a flow graph from a JSON-shaped document.
///
/// `Err` carries the single shape error when the document cannot be read at
/// all. Otherwise the graph of well-formed flows is returned with a report
/// that lists per-entry `missing_field` errors before the graph errors.
pub fn validate_flow_value(value: &Value) -> Result<(FlowGraph, ValidationReport), ValidationError> {
    let parsed = FlowGraph::from_value(value)?;
    let mut errors = parsed.errors.clone();
    errors.extend(flow_graph_errors(
        parsed.entries.iter().map(|(index, flow)| (*index, flow)),
    ));
    Ok((parsed.graph(), ValidationReport::from_errors(errors)))
}

/// Reads and validates a structure graph from a JSON-shaped document.
pub fn validate_structure_value(
    value: &Value,
) -> Result<(StructureGraph, ValidationReport), ValidationError> {
    let parsed = StructureGraph::from_value(value)?;
    let mut errors = parsed.errors.clone();
    errors.extend(structure_graph_errors(
        parsed
            .entries
            .iter()
            .map(|(index, component)| (*index, component)),
    ));
    Ok((parsed.graph(), ValidationReport::from_errors(errors)))
}

/// Flow checks over `(input index, flow)` pairs.
///
/// Self references and duplicates are reported per flow in input order,
/// followed by at most one `data_flow_cycle`. Self references and edges
/// touching the external boundary are left out of the cycle graph.
pub(crate) fn flow_graph_errors<'a, I>(flows: I) -> Vec<ValidationError>
where
    I: IntoIterator<Item = (usize, &'a DataFlow)>,
{
    let mut errors = Vec::new();
    let mut seen_pairs: HashSet<(&str, &str)> = HashSet::new();
    let mut graph = DependencyGraph::new();

    for (index, flow) in flows {
        if flow.is_self_reference() {
            errors.push(ValidationError::self_reference(index, &flow.source));
        }

        let pair = (flow.source.as_str(), flow.destination.as_str());
        if !seen_pairs.insert(pair) {
            errors.push(ValidationError::duplicate_flow(
                index,
                &flow.source,
                &flow.destination,
            ));
        }

        if !flow.is_self_reference() && !flow.touches_external() {
            graph.add_edge(&flow.source, &flow.destination);
        }
    }

    if let Some((node, next)) = graph.find_cycle() {
        tracing::debug!(node = %node, next = %next, "Cycle found in data flow");
        errors.push(ValidationError::data_flow_cycle(&node, &next));
    }

    errors
}

/// Structure checks over `(input index, component)` pairs.
///
/// A required dependency must name a component declared at or before this
/// one. The component at input index 0 may reference anything.
pub(crate) fn structure_graph_errors<'a, I>(components: I) -> Vec<ValidationError>
where
    I: IntoIterator<Item = (usize, &'a Component)>,
{
    let mut errors = Vec::new();
    let mut names: HashSet<&str> = HashSet::new();
    let mut sequence_numbers: HashSet<i64> = HashSet::new();
    let mut graph = DependencyGraph::new();

    for (index, component) in components {
        if !names.insert(component.name.as_str()) {
            errors.push(ValidationError::duplicate_component_name(
                index,
                &component.name,
            ));
        }
        if !sequence_numbers.insert(component.sequence_number) {
            errors.push(ValidationError::duplicate_sequence_number(
                index,
                component.sequence_number,
            ));
        }

        graph.add_node(&component.name);
        for dependency in &component.dependencies.required {
            if index > 0 && !names.contains(dependency.as_str()) {
                errors.push(ValidationError::undefined_dependency(
                    index,
                    &component.name,
                    dependency,
                ));
            }
            graph.add_edge(&component.name, dependency);
        }
    }

    if let Some((node, next)) = graph.find_cycle() {
        tracing::debug!(node = %node, next = %next, "Cycle found in component dependencies");
        errors.push(ValidationError::dependency_cycle(&node, &next));
    }

    errors
}
