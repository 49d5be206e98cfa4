//! Component decomposition produced by the structure stage of the pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::validation::ValidationError;

const REQUIRED_COMPONENT_FIELDS: [&str; 3] = ["name", "sequence_number", "dependencies"];

/// Declared dependencies of a component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDependencies {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
}

/// One named component of the ordered decomposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub sequence_number: i64,
    #[serde(default)]
    pub dependencies: ComponentDependencies,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Component {
    pub fn new(name: impl Into<String>, sequence_number: i64) -> Self {
        Self {
            name: name.into(),
            sequence_number,
            dependencies: ComponentDependencies::default(),
            description: None,
        }
    }

    pub fn requires<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.required = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn optionally<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.optional = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Components in declared order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureGraph {
    pub ordered_components: Vec<Component>,
}

/// Outcome of reading a structure graph from loosely-typed input.
#[derive(Debug, Clone, Default)]
pub struct ParsedStructureGraph {
    pub entries: Vec<(usize, Component)>,
    pub errors: Vec<ValidationError>,
}

impl ParsedStructureGraph {
    pub fn graph(&self) -> StructureGraph {
        StructureGraph {
            ordered_components: self.entries.iter().map(|(_, c)| c.clone()).collect(),
        }
    }
}

impl StructureGraph {
    pub fn new(ordered_components: Vec<Component>) -> Self {
        Self { ordered_components }
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.ordered_components.push(component);
        self
    }

    pub fn len(&self) -> usize {
        self.ordered_components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered_components.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ordered_components.iter().map(|c| c.name.as_str())
    }

    /// Reads a structure graph from a JSON-shaped value.
    ///
    /// Shape failures of the document return `Err`; bad components become
    /// `missing_field` errors and are skipped.
    pub fn from_value(value: &Value) -> Result<ParsedStructureGraph, ValidationError> {
        let Some(document) = value.as_object() else {
            return Err(ValidationError::invalid_structure_format(
                "Structure must be a dictionary",
            ));
        };
        let Some(components) = document.get("ordered_components") else {
            return Err(ValidationError::missing_components());
        };
        let Some(components) = components.as_array() else {
            return Err(ValidationError::invalid_structure_format(
                "'ordered_components' must be a list",
            ));
        };

        let mut parsed = ParsedStructureGraph::default();
        for (index, entry) in components.iter().enumerate() {
            match parse_component(index, entry) {
                Ok(component) => parsed.entries.push((index, component)),
                Err(mut errors) => parsed.errors.append(&mut errors),
            }
        }
        Ok(parsed)
    }
}

fn parse_component(index: usize, entry: &Value) -> Result<Component, Vec<ValidationError>> {
    let empty = Map::new();
    let fields = entry.as_object().unwrap_or(&empty);

    let missing: Vec<ValidationError> = REQUIRED_COMPONENT_FIELDS
        .iter()
        .filter(|field| !fields.contains_key(**field))
        .map(|field| ValidationError::missing_component_field(index, field))
        .collect();
    if !missing.is_empty() {
        return Err(missing);
    }

    let mut errors = Vec::new();

    let name = fields.get("name").and_then(Value::as_str);
    if name.is_none() {
        errors.push(ValidationError::malformed_component_field(index, "name", "a string"));
    }

    let sequence_number = fields.get("sequence_number").and_then(Value::as_i64);
    if sequence_number.is_none() {
        errors.push(ValidationError::malformed_component_field(
            index,
            "sequence_number",
            "an integer",
        ));
    }

    let dependencies = match fields.get("dependencies") {
        Some(Value::Object(deps)) => {
            let required = string_list(deps.get("required"));
            let optional = string_list(deps.get("optional"));
            if required.is_none() || optional.is_none() {
                errors.push(ValidationError::malformed_component_field(
                    index,
                    "dependencies",
                    "lists of component names",
                ));
            }
            ComponentDependencies {
                required: required.unwrap_or_default(),
                optional: optional.unwrap_or_default(),
            }
        }
        _ => {
            errors.push(ValidationError::malformed_component_field(
                index,
                "dependencies",
                "an object",
            ));
            ComponentDependencies::default()
        }
    };

    match (name, sequence_number) {
        (Some(name), Some(sequence_number)) if errors.is_empty() => Ok(Component {
            name: name.to_string(),
            sequence_number,
            dependencies,
            description: fields
                .get("description")
                .and_then(Value::as_str)
                .map(String::from),
        }),
        _ => Err(errors),
    }
}

/// Absent lists are empty; anything other than a list of strings is `None`.
fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    match value {
        None | Some(Value::Null) => Some(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(String::from))
            .collect(),
        Some(_) => None,
    }
}
