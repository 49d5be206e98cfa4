//! Stateful validation facade.
//!
//! Wraps the pure graph validators with a cache of the most recently
//! validated graphs, so cross-consistency can run without re-supplying them,
//! and an append-only history of validation events.

use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::models::{
    FeedbackPayload, FlowGraph, ResponsibleParty, StructureGraph, ValidationError,
    ValidationEvent, ValidationEventType, ValidationReport, ValidationStatus, ValidationSummary,
};
use crate::domain::ports::{EventEmitter, EventPriority};
use crate::services::{cross_consistency, graph_validator, responsibility_router};

/// Event type published after every recorded validation.
pub const VALIDATION_COMPLETED_EVENT: &str = "validation.completed";

#[derive(Debug, Default)]
struct GraphCache {
    flow: Option<Arc<FlowGraph>>,
    structure: Option<Arc<StructureGraph>>,
}

/// Validates flow and structure graphs and tracks the session's results.
///
/// Safe to share between threads. The cache and the history each sit behind
/// their own short-lived lock; validation itself runs outside both.
pub struct DependencyValidator {
    cache: Mutex<GraphCache>,
    history: Mutex<Vec<ValidationEvent>>,
    emitter: Option<Arc<dyn EventEmitter>>,
}

impl Default for DependencyValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyValidator {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(GraphCache::default()),
            history: Mutex::new(Vec::new()),
            emitter: None,
        }
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Validates a flow document. A document that cannot be read at all
    /// yields its shape error and leaves the cache and history untouched.
    pub fn validate_flow(&self, value: &Value) -> ValidationReport {
        match graph_validator::validate_flow_value(value) {
            Ok((graph, report)) => {
                self.lock_cache().flow = Some(Arc::new(graph));
                self.record(ValidationEventType::DataFlow, &report);
                report
            }
            Err(error) => {
                tracing::warn!(error_type = %error.kind, "Data flow document rejected");
                ValidationReport::single(error)
            }
        }
    }

    pub fn validate_flow_graph(&self, graph: &FlowGraph) -> ValidationReport {
        let report = graph_validator::validate_flow_graph(graph);
        self.lock_cache().flow = Some(Arc::new(graph.clone()));
        self.record(ValidationEventType::DataFlow, &report);
        report
    }

    /// Validates a structure document; shape errors behave as in
    /// [`validate_flow`](Self::validate_flow).
    pub fn validate_structure(&self, value: &Value) -> ValidationReport {
        match graph_validator::validate_structure_value(value) {
            Ok((graph, report)) => {
                self.lock_cache().structure = Some(Arc::new(graph));
                self.record(ValidationEventType::StructuralBreakdown, &report);
                report
            }
            Err(error) => {
                tracing::warn!(error_type = %error.kind, "Structure document rejected");
                ValidationReport::single(error)
            }
        }
    }

    pub fn validate_structure_graph(&self, structure: &StructureGraph) -> ValidationReport {
        let report = graph_validator::validate_structure_graph(structure);
        self.lock_cache().structure = Some(Arc::new(structure.clone()));
        self.record(ValidationEventType::StructuralBreakdown, &report);
        report
    }

    /// Checks that the two graphs agree.
    ///
    /// Either argument may be omitted to use the most recently validated
    /// graph of that kind. With neither supplied nor cached, the result is a
    /// single `missing_validation_data` error and nothing is recorded.
    pub fn validate_cross_consistency(
        &self,
        flow: Option<&FlowGraph>,
        structure: Option<&StructureGraph>,
    ) -> ValidationReport {
        let (cached_flow, cached_structure) = {
            let cache = self.lock_cache();
            (cache.flow.clone(), cache.structure.clone())
        };

        let (Some(flow), Some(structure)) = (
            flow.or(cached_flow.as_deref()),
            structure.or(cached_structure.as_deref()),
        ) else {
            return ValidationReport::single(ValidationError::missing_validation_data());
        };

        let report = cross_consistency::check_cross_consistency(flow, structure);
        self.record(ValidationEventType::CrossConsistency, &report);
        report
    }

    pub fn determine_responsible_party(
        &self,
        errors: &[ValidationError],
    ) -> Option<ResponsibleParty> {
        responsibility_router::determine_responsible_party(errors)
    }

    pub fn prepare_feedback(
        &self,
        party: ResponsibleParty,
        errors: &[ValidationError],
    ) -> FeedbackPayload {
        responsibility_router::prepare_feedback(party, errors)
    }

    pub fn cached_flow(&self) -> Option<Arc<FlowGraph>> {
        self.lock_cache().flow.clone()
    }

    pub fn cached_structure(&self) -> Option<Arc<StructureGraph>> {
        self.lock_cache().structure.clone()
    }

    /// Snapshot of the history; later validations do not change it.
    pub fn history(&self) -> Vec<ValidationEvent> {
        self.lock_history().clone()
    }

    pub fn summary(&self) -> ValidationSummary {
        let (data_flow_validated, structural_breakdown_validated) = {
            let cache = self.lock_cache();
            (cache.flow.is_some(), cache.structure.is_some())
        };
        let history = self.history();

        let overall_status = if history
            .iter()
            .all(|event| event.status == ValidationStatus::Success)
        {
            ValidationStatus::Success
        } else {
            ValidationStatus::Failure
        };

        ValidationSummary {
            data_flow_validated,
            structural_breakdown_validated,
            cross_consistency_validated: history
                .iter()
                .any(|event| event.event_type == ValidationEventType::CrossConsistency),
            latest_validation_time: history.last().map(|event| event.timestamp),
            overall_status,
            history,
        }
    }

    /// Forget cached graphs and clear the history.
    pub fn reset(&self) {
        *self.lock_cache() = GraphCache::default();
        self.lock_history().clear();
        tracing::debug!("Validation session reset");
    }

    fn record(&self, event_type: ValidationEventType, report: &ValidationReport) {
        let event = ValidationEvent::new(event_type, report.errors.clone());
        tracing::info!(
            event_type = event_type.as_str(),
            valid = report.valid,
            error_count = report.errors.len(),
            "Validation recorded"
        );

        if let Some(emitter) = &self.emitter {
            let priority = if report.valid {
                EventPriority::Normal
            } else {
                EventPriority::High
            };
            let payload = json!({
                "event_type": event_type,
                "status": event.status,
                "error_count": report.errors.len(),
                "timestamp": event.timestamp,
            });
            if let Err(e) = emitter.emit(VALIDATION_COMPLETED_EVENT, payload, None, priority) {
                tracing::warn!(error = %e, "Failed to emit validation event");
            }
        }

        self.lock_history().push(event);
    }

    fn lock_cache(&self) -> MutexGuard<'_, GraphCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_history(&self) -> MutexGuard<'_, Vec<ValidationEvent>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
