//! Operator port schemas.
//!
//! Operator metadata is owned by an external service; the core only needs
//! each operator type's declared ports and whether an input port accepts
//! more than one inbound link. [`OperatorSchemaSource`] is that seam, and
//! [`StaticSchemaRegistry`] is an in-memory implementation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::model::{Operator, PortDescription};

/// Declared properties of one port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PortSchema {
    #[serde(default)]
    pub display_name: Option<String>,
    /// Whether this input port accepts several inbound links
    #[serde(default)]
    pub allow_multi_inputs: bool,
}

impl PortSchema {
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            allow_multi_inputs: false,
        }
    }

    pub fn multi(mut self) -> Self {
        self.allow_multi_inputs = true;
        self
    }
}

/// Declared shape of an operator type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct OperatorSchema {
    pub operator_type: String,
    #[serde(default)]
    pub operator_version: String,
    #[serde(default)]
    pub input_ports: Vec<PortSchema>,
    #[serde(default)]
    pub output_ports: Vec<PortSchema>,
}

impl OperatorSchema {
    /// Schema with `n_in` plain input ports and `n_out` output ports.
    pub fn with_ports(operator_type: impl Into<String>, n_in: usize, n_out: usize) -> Self {
        Self {
            operator_type: operator_type.into(),
            operator_version: String::new(),
            input_ports: vec![PortSchema::default(); n_in],
            output_ports: vec![PortSchema::default(); n_out],
        }
    }

    /// Build a new operator of this type with a generated id.
    pub fn instantiate(&self) -> Operator {
        let mut operator = Operator::with_generated_id(
            self.operator_type.clone(),
            self.input_ports.len(),
            self.output_ports.len(),
        );
        operator.operator_version = self.operator_version.clone();
        apply_display_names(&mut operator.input_ports, &self.input_ports);
        apply_display_names(&mut operator.output_ports, &self.output_ports);
        operator
    }
}

fn apply_display_names(ports: &mut [PortDescription], schemas: &[PortSchema]) {
    for (port, schema) in ports.iter_mut().zip(schemas) {
        port.display_name = schema.display_name.clone();
    }
}

/// Source of operator port schemas, consulted by link validation.
pub trait OperatorSchemaSource: Send + Sync {
    fn schema(&self, operator_type: &str) -> Option<OperatorSchema>;

    /// Whether input port `port_index` of `operator_type` accepts several
    /// inbound links. Unknown types and ports allow only one.
    fn allows_multiple_inputs(&self, operator_type: &str, port_index: usize) -> bool {
        self.schema(operator_type)
            .and_then(|schema| schema.input_ports.get(port_index).cloned())
            .is_some_and(|port| port.allow_multi_inputs)
    }
}

/// A fixed set of schemas held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaRegistry {
    schemas: HashMap<String, OperatorSchema>,
}

impl StaticSchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: OperatorSchema) {
        self.schemas.insert(schema.operator_type.clone(), schema);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, schema: OperatorSchema) -> Self {
        self.register(schema);
        self
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl OperatorSchemaSource for StaticSchemaRegistry {
    fn schema(&self, operator_type: &str) -> Option<OperatorSchema> {
        self.schemas.get(operator_type).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_input_lookup() {
        let mut union = OperatorSchema::with_ports("Union", 1, 1);
        union.input_ports[0] = PortSchema::named("in").multi();
        let registry = StaticSchemaRegistry::new()
            .with(union)
            .with(OperatorSchema::with_ports("Filter", 1, 1));

        assert!(registry.allows_multiple_inputs("Union", 0));
        assert!(!registry.allows_multiple_inputs("Filter", 0));
        assert!(!registry.allows_multiple_inputs("Union", 5));
        assert!(!registry.allows_multiple_inputs("Unknown", 0));
    }

    #[test]
    fn test_instantiate_copies_ports() {
        let mut schema = OperatorSchema::with_ports("Join", 2, 1);
        schema.operator_version = "v2".to_string();
        schema.input_ports[0] = PortSchema::named("left");
        let op = schema.instantiate();

        assert!(op.operator_id.starts_with("Join-operator-"));
        assert_eq!(op.input_ports.len(), 2);
        assert_eq!(op.input_ports[0].display_name.as_deref(), Some("left"));
        assert_eq!(op.operator_version, "v2");
    }
}
