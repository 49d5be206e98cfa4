//! Data-flow graph produced by the flow stage of the pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::validation::ValidationError;

/// Reserved node name for the boundary outside the system.
pub const EXTERNAL_NODE: &str = "external";

const REQUIRED_FLOW_FIELDS: [&str; 3] = ["source", "destination", "data_type"];

/// A directed movement of data between two components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFlow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
    pub source: String,
    pub destination: String,
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

impl DataFlow {
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            flow_id: None,
            source: source.into(),
            destination: destination.into(),
            data_type: data_type.into(),
            transformation: None,
            trigger: None,
        }
    }

    pub fn with_id(mut self, flow_id: impl Into<String>) -> Self {
        self.flow_id = Some(flow_id.into());
        self
    }

    pub fn with_transformation(mut self, transformation: impl Into<String>) -> Self {
        self.transformation = Some(transformation.into());
        self
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    /// True when either end is the external boundary.
    pub fn touches_external(&self) -> bool {
        self.source == EXTERNAL_NODE || self.destination == EXTERNAL_NODE
    }

    pub fn is_self_reference(&self) -> bool {
        self.source == self.destination
    }
}

/// The complete flow graph: an ordered list of flows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowGraph {
    pub data_flows: Vec<DataFlow>,
}

/// Outcome of reading a flow graph from loosely-typed input.
///
/// `entries` keeps each well-formed flow with its position in the input list
/// so later errors still point at the original index.
#[derive(Debug, Clone, Default)]
pub struct ParsedFlowGraph {
    pub entries: Vec<(usize, DataFlow)>,
    pub errors: Vec<ValidationError>,
}

impl ParsedFlowGraph {
    /// Graph made of the well-formed flows only.
    pub fn graph(&self) -> FlowGraph {
        FlowGraph {
            data_flows: self.entries.iter().map(|(_, flow)| flow.clone()).collect(),
        }
    }
}

impl FlowGraph {
    pub fn new(data_flows: Vec<DataFlow>) -> Self {
        Self { data_flows }
    }

    pub fn with_flow(mut self, flow: DataFlow) -> Self {
        self.data_flows.push(flow);
        self
    }

    pub fn len(&self) -> usize {
        self.data_flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_flows.is_empty()
    }

    /// Reads a flow graph from a JSON-shaped value.
    ///
    /// Returns `Err` only when the document itself has the wrong shape.
    /// Individual flows with missing or mistyped fields become `missing_field`
    /// errors and are left out of `entries`.
    pub fn from_value(value: &Value) -> Result<ParsedFlowGraph, ValidationError> {
        let Some(document) = value.as_object() else {
            return Err(ValidationError::invalid_data_flow_structure(
                "Data flow must be a dictionary",
            ));
        };
        let Some(flows) = document.get("data_flows") else {
            return Err(ValidationError::missing_data_flows());
        };
        let Some(flows) = flows.as_array() else {
            return Err(ValidationError::invalid_data_flow_structure(
                "'data_flows' must be a list",
            ));
        };

        let mut parsed = ParsedFlowGraph::default();
        for (index, entry) in flows.iter().enumerate() {
            match parse_flow(index, entry) {
                Ok(flow) => parsed.entries.push((index, flow)),
                Err(mut errors) => parsed.errors.append(&mut errors),
            }
        }
        Ok(parsed)
    }
}

fn parse_flow(index: usize, entry: &Value) -> Result<DataFlow, Vec<ValidationError>> {
    let empty = Map::new();
    let fields = entry.as_object().unwrap_or(&empty);

    let mut errors = Vec::new();
    let mut values = Vec::with_capacity(REQUIRED_FLOW_FIELDS.len());
    for field in REQUIRED_FLOW_FIELDS {
        match fields.get(field) {
            None => errors.push(ValidationError::missing_flow_field(index, field)),
            Some(Value::String(s)) => values.push(s.clone()),
            Some(_) => errors.push(ValidationError::malformed_flow_field(index, field, "a string")),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let optional = |key: &str| fields.get(key).and_then(Value::as_str).map(String::from);
    let mut values = values.into_iter();
    Ok(DataFlow {
        flow_id: optional("flow_id"),
        source: values.next().unwrap_or_default(),
        destination: values.next().unwrap_or_default(),
        data_type: values.next().unwrap_or_default(),
        transformation: optional("transformation"),
        trigger: optional("trigger"),
    })
}
