//! Node kind metadata
//!
//! Every processing unit describes itself with a [`NodeMetadata`]: its
//! type tag, ports and capability flags. The engine reads it to validate
//! connections and to decide how a node cooks; hosts read it to render
//! palettes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{NodeCategory, PortDataType};

/// Complete metadata for a node kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    /// Unique type tag (e.g., "looper")
    pub node_type: String,
    /// Category for UI grouping
    pub category: NodeCategory,
    /// Human-readable label
    pub label: String,
    /// Description of what the node does
    pub description: String,
    /// Input ports in slot order
    pub inputs: Vec<PortMetadata>,
    /// Output ports in slot order
    pub outputs: Vec<PortMetadata>,
    /// Connecting any input replaces every existing input connection
    pub single_input: bool,
    /// Each output slot feeds at most one connection
    pub single_output: bool,
    /// Cooks on every pass regardless of state
    pub time_dependent: bool,
    /// Skips cooking when resolved parameters and inputs hash as last time
    pub content_hashed: bool,
}

impl NodeMetadata {
    pub fn new(
        node_type: impl Into<String>,
        category: NodeCategory,
        label: impl Into<String>,
    ) -> Self {
        Self {
            node_type: node_type.into(),
            category,
            label: label.into(),
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            single_input: false,
            single_output: false,
            time_dependent: false,
            content_hashed: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_input(mut self, port: PortMetadata) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn with_output(mut self, port: PortMetadata) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn single_input(mut self) -> Self {
        self.single_input = true;
        self
    }

    pub fn single_output(mut self) -> Self {
        self.single_output = true;
        self
    }

    pub fn time_dependent(mut self) -> Self {
        self.time_dependent = true;
        self
    }

    pub fn content_hashed(mut self) -> Self {
        self.content_hashed = true;
        self
    }

    /// Whether the last input port accepts any number of connections
    pub fn is_variadic(&self) -> bool {
        self.inputs.last().map(|p| p.multiple).unwrap_or(false)
    }

    /// Whether `index` names a usable input slot
    pub fn accepts_input(&self, index: usize) -> bool {
        index < self.inputs.len() || self.is_variadic()
    }

    /// Input port ids keyed by slot
    pub fn input_names(&self) -> BTreeMap<usize, String> {
        self.inputs
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.id.clone()))
            .collect()
    }

    /// Output port ids keyed by slot
    pub fn output_names(&self) -> BTreeMap<usize, String> {
        self.outputs
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.id.clone()))
            .collect()
    }

    pub fn input_data_types(&self) -> BTreeMap<usize, PortDataType> {
        self.inputs
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.data_type))
            .collect()
    }

    pub fn output_data_types(&self) -> BTreeMap<usize, PortDataType> {
        self.outputs
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.data_type))
            .collect()
    }

    /// Data type of an input slot (variadic slots share the last port's)
    pub fn input_data_type(&self, index: usize) -> Option<PortDataType> {
        match self.inputs.get(index) {
            Some(port) => Some(port.data_type),
            None if self.is_variadic() => self.inputs.last().map(|p| p.data_type),
            None => None,
        }
    }
}

/// Metadata for a port (input or output)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMetadata {
    /// Port identifier
    pub id: String,
    /// Human-readable label
    pub label: String,
    /// Data type
    pub data_type: PortDataType,
    /// Whether this input must be connected
    pub required: bool,
    /// Whether further connections open additional slots
    pub multiple: bool,
}

impl PortMetadata {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        data_type: PortDataType,
        required: bool,
        multiple: bool,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            data_type,
            required,
            multiple,
        }
    }

    /// Create a required port
    pub fn required(
        id: impl Into<String>,
        label: impl Into<String>,
        data_type: PortDataType,
    ) -> Self {
        Self::new(id, label, data_type, true, false)
    }

    /// Create an optional port
    pub fn optional(
        id: impl Into<String>,
        label: impl Into<String>,
        data_type: PortDataType,
    ) -> Self {
        Self::new(id, label, data_type, false, false)
    }

    /// Set this port to accept multiple connections
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge_like() -> NodeMetadata {
        NodeMetadata::new("merge", NodeCategory::Processing, "Merge")
            .with_input(PortMetadata::optional("texts", "Texts", PortDataType::Text).multiple())
            .with_output(PortMetadata::optional("text", "Text", PortDataType::Text))
    }

    #[test]
    fn test_port_metadata_required() {
        let port = PortMetadata::required("input", "Input", PortDataType::Text);
        assert_eq!(port.id, "input");
        assert!(port.required);
        assert!(!port.multiple);
    }

    #[test]
    fn test_dense_maps() {
        let meta = NodeMetadata::new("split", NodeCategory::Processing, "Split")
            .with_input(PortMetadata::required("text", "Text", PortDataType::Text))
            .with_output(PortMetadata::optional("items", "Items", PortDataType::Text))
            .with_output(PortMetadata::optional("rest", "Rest", PortDataType::Text));

        let outputs = meta.output_names();
        assert_eq!(outputs.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(outputs[&1], "rest");
        assert_eq!(meta.input_names()[&0], "text");
        assert_eq!(meta.input_data_types()[&0], PortDataType::Text);
    }

    #[test]
    fn test_variadic_inputs() {
        let meta = merge_like();
        assert!(meta.is_variadic());
        assert!(meta.accepts_input(7));
        assert_eq!(meta.input_data_type(7), Some(PortDataType::Text));

        let fixed = NodeMetadata::new("text", NodeCategory::Input, "Text")
            .with_input(PortMetadata::optional("text", "Text", PortDataType::Text));
        assert!(!fixed.accepts_input(1));
    }
}
