use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

use sentinel::domain::models::{
    Component, DataFlow, ErrorKind, FlowGraph, ResponsibleParty, StructureGraph, ValidationError,
};
use sentinel::domain::ports::NullEventEmitter;
use sentinel::services::{
    determine_responsible_party, validate_flow_graph, validate_structure_graph,
    CircuitBreakerRegistry,
};

fn node(i: usize) -> String {
    format!("stage_{i}")
}

/// Forward-only edges over `n` nodes: never a cycle, never a self reference.
fn forward_edges(n: usize) -> impl Strategy<Value = BTreeSet<(usize, usize)>> {
    prop::collection::btree_set((0..n, 0..n), 0..40)
        .prop_map(|pairs| pairs.into_iter().filter(|(a, b)| a < b).collect())
}

fn flows(edges: &BTreeSet<(usize, usize)>) -> Vec<DataFlow> {
    edges
        .iter()
        .map(|(a, b)| DataFlow::new(node(*a), node(*b), "payload"))
        .collect()
}

proptest! {
    /// Property: forward-only flow graphs without duplicates are valid
    #[test]
    fn prop_acyclic_flow_graph_is_valid(edges in (2usize..16).prop_flat_map(forward_edges)) {
        let report = validate_flow_graph(&FlowGraph::new(flows(&edges)));
        prop_assert!(report.valid, "unexpected errors: {:?}", report.errors);
    }

    /// Property: closing a chain back on itself is always caught
    #[test]
    fn prop_closed_chain_reports_one_cycle(
        len in 2usize..30,
        extra in (2usize..16).prop_flat_map(forward_edges),
    ) {
        let mut edges: BTreeSet<(usize, usize)> = (0..len - 1).map(|i| (i, i + 1)).collect();
        edges.extend(extra);
        let mut data_flows = flows(&edges);
        data_flows.push(DataFlow::new(node(len - 1), node(0), "payload"));

        let report = validate_flow_graph(&FlowGraph::new(data_flows));
        prop_assert!(!report.valid);
        prop_assert_eq!(report.count(ErrorKind::DataFlowCycle), 1);
    }

    /// Property: repeating any flow yields exactly one duplicate error per repeat
    #[test]
    fn prop_repeated_flow_is_duplicate(
        edges in (3usize..12).prop_flat_map(forward_edges),
        pick in any::<prop::sample::Index>(),
    ) {
        prop_assume!(!edges.is_empty());
        let mut data_flows = flows(&edges);
        let repeated = data_flows[pick.index(data_flows.len())].clone();
        data_flows.push(repeated);

        let report = validate_flow_graph(&FlowGraph::new(data_flows));
        prop_assert_eq!(report.count(ErrorKind::DuplicateFlow), 1);
        prop_assert_eq!(report.errors.len(), 1);
    }

    /// Property: components depending only on earlier components are valid
    #[test]
    fn prop_backward_dependencies_are_valid(
        deps in prop::collection::vec(prop::collection::btree_set(0usize..20, 0..4), 1..20)
    ) {
        let components: Vec<Component> = deps
            .iter()
            .enumerate()
            .map(|(i, wanted)| {
                let earlier: Vec<String> = wanted.iter().filter(|d| **d < i).map(|d| node(*d)).collect();
                Component::new(node(i), i64::try_from(i).unwrap() + 1).requires(earlier)
            })
            .collect();

        let report = validate_structure_graph(&StructureGraph::new(components));
        prop_assert!(report.valid, "unexpected errors: {:?}", report.errors);
    }

    /// Property: strict majority decides, ties go to flow, nothing owned means nobody
    #[test]
    fn prop_router_majority(flow_errors in 0usize..6, structure_errors in 0usize..6, unowned in 0usize..3) {
        let mut errors: Vec<ValidationError> = Vec::new();
        errors.extend((0..flow_errors).map(|i| ValidationError::self_reference(i, "A")));
        errors.extend((0..structure_errors).map(|i| ValidationError::undefined_dependency(i + 1, "B", "Z")));
        errors.extend((0..unowned).map(|i| ValidationError::missing_flow_field(i, "source")));

        let expected = if flow_errors == 0 && structure_errors == 0 {
            None
        } else if structure_errors > flow_errors {
            Some(ResponsibleParty::Structure)
        } else {
            Some(ResponsibleParty::Flow)
        };
        prop_assert_eq!(determine_responsible_party(&errors), expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: concurrent registration of distinct names loses nothing
    #[test]
    fn prop_concurrent_registration_is_complete(names in 1usize..40, threads in 1usize..6) {
        let registry = Arc::new(CircuitBreakerRegistry::new(Arc::new(NullEventEmitter::new())));
        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in (t..names).step_by(threads) {
                        registry.register(&node(i), None);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        prop_assert_eq!(registry.summary().len(), names);
    }
}
