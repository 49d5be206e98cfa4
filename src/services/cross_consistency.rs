//! Agreement check between the flow graph and the structure graph.
//!
//! Data moving from `X` into `Y` means `Y` depends on `X`. The structure
//! must declare exactly those required dependencies that the flows imply,
//! ignoring anything that crosses the external boundary.

use std::collections::{HashMap, HashSet};

use crate::domain::models::{FlowGraph, StructureGraph, ValidationError, ValidationReport, EXTERNAL_NODE};

pub fn check_cross_consistency(flow: &FlowGraph, structure: &StructureGraph) -> ValidationReport {
    let components: HashSet<&str> = structure.names().collect();
    let mut errors = Vec::new();

    for (index, data_flow) in flow.data_flows.iter().enumerate() {
        if data_flow.source != EXTERNAL_NODE && !components.contains(data_flow.source.as_str()) {
            errors.push(ValidationError::flow_invalid_source(index, &data_flow.source));
        }
        if data_flow.destination != EXTERNAL_NODE
            && !components.contains(data_flow.destination.as_str())
        {
            errors.push(ValidationError::flow_invalid_destination(
                index,
                &data_flow.destination,
            ));
        }
    }

    let flow_sources = sources_by_destination(flow);

    for component in &structure.ordered_components {
        let declared = unique(component.dependencies.required.iter().map(String::as_str));
        let observed = flow_sources
            .get(component.name.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default();

        for source in observed {
            if !declared.contains(source) {
                errors.push(ValidationError::missing_structural_dependency(
                    &component.name,
                    source,
                ));
            }
        }

        for dependency in &declared {
            if components.contains(dependency) && !observed.contains(dependency) {
                errors.push(ValidationError::missing_data_flow(&component.name, dependency));
            }
        }
    }

    tracing::debug!(
        flows = flow.len(),
        components = structure.len(),
        errors = errors.len(),
        "Cross-consistency check finished"
    );
    ValidationReport::from_errors(errors)
}

/// `destination -> sources` in flow order, external edges excluded.
fn sources_by_destination(flow: &FlowGraph) -> HashMap<&str, Vec<&str>> {
    let mut map: HashMap<&str, Vec<&str>> = HashMap::new();
    for data_flow in &flow.data_flows {
        if data_flow.touches_external() {
            continue;
        }
        let sources = map.entry(data_flow.destination.as_str()).or_default();
        if !sources.contains(&data_flow.source.as_str()) {
            sources.push(data_flow.source.as_str());
        }
    }
    map
}

fn unique<'a>(items: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    items.filter(|item| seen.insert(*item)).collect()
}
