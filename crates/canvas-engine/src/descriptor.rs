//! Node type definitions and provider bindings
//!
//! A `NodeDefinition` is the single source of truth for what a freshly
//! added node looks like (ports, parameters, footprint) and how it is
//! executed. The execution route is a closed `ProviderBinding` variant,
//! resolved once when the definition is looked up, so executors never
//! dispatch on raw node-type strings.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, NodeCategory, Port, ValueMap};

/// Dedicated provider routes for node types that need bespoke request shaping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    /// Composite of a model photo and a garment image
    VirtualTryOn,
    /// Story generation from a premise
    StoryGenesis,
    /// Multi-view character sheet generation
    CharacterSheet,
}

impl AdapterKind {
    /// Provider route used for the dedicated call
    pub fn route(&self) -> &'static str {
        match self {
            Self::VirtualTryOn => "virtual-try-on",
            Self::StoryGenesis => "story-genesis",
            Self::CharacterSheet => "character-sheet",
        }
    }
}

/// How a node of a given type is executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "adapter", rename_all = "snake_case")]
pub enum ProviderBinding {
    /// Uniform provider `execute` call with inputs and parameters
    #[default]
    Uniform,
    /// Provider-specific call through a registered adapter
    Dedicated(AdapterKind),
    /// Leaf input node: completes locally by publishing its parameters
    Passthrough,
}

/// Complete definition of a node type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDefinition {
    /// Unique type identifier (e.g., "image-generation")
    pub node_type: String,
    /// Category for grouping and layout heuristics
    pub category: NodeCategory,
    /// Human-readable label
    pub label: String,
    /// Input ports a new node starts with
    pub default_inputs: Vec<Port>,
    /// Output ports a new node starts with
    pub default_outputs: Vec<Port>,
    /// Parameters a new node starts with
    #[serde(default)]
    pub default_parameters: ValueMap,
    /// Execution route
    #[serde(default)]
    pub provider_binding: ProviderBinding,
    /// Initial footprint on the canvas
    #[serde(default)]
    pub default_dimensions: Dimensions,
}

impl NodeDefinition {
    /// Start a definition with no ports and uniform execution
    pub fn new(node_type: impl Into<String>, category: NodeCategory, label: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            category,
            label: label.into(),
            default_inputs: Vec::new(),
            default_outputs: Vec::new(),
            default_parameters: ValueMap::new(),
            provider_binding: ProviderBinding::Uniform,
            default_dimensions: Dimensions::default(),
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<Port>) -> Self {
        self.default_inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<Port>) -> Self {
        self.default_outputs = outputs;
        self
    }

    /// Set default parameters from a JSON object (non-objects are ignored)
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = parameters {
            self.default_parameters = map;
        }
        self
    }

    pub fn with_binding(mut self, binding: ProviderBinding) -> Self {
        self.provider_binding = binding;
        self
    }

    pub fn with_dimensions(mut self, width: f64, height: f64) -> Self {
        self.default_dimensions = Dimensions::new(width, height);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PortType;

    #[test]
    fn test_definition_builder() {
        let def = NodeDefinition::new("virtual-try-on", NodeCategory::Fashion, "Virtual Try-On")
            .with_inputs(vec![
                Port::required("model", "Model", PortType::Model),
                Port::required("garment", "Garment", PortType::Garment),
            ])
            .with_outputs(vec![Port::optional("image", "Result", PortType::Image)])
            .with_parameters(serde_json::json!({"category": "tops"}))
            .with_binding(ProviderBinding::Dedicated(AdapterKind::VirtualTryOn));

        assert_eq!(def.default_inputs.len(), 2);
        assert_eq!(def.default_parameters["category"], "tops");
        assert_eq!(
            def.provider_binding,
            ProviderBinding::Dedicated(AdapterKind::VirtualTryOn)
        );
    }

    #[test]
    fn test_binding_serialization() {
        let json = serde_json::to_value(ProviderBinding::Dedicated(AdapterKind::StoryGenesis)).unwrap();
        assert_eq!(json["kind"], "dedicated");
        assert_eq!(json["adapter"], "story_genesis");

        let json = serde_json::to_value(ProviderBinding::Passthrough).unwrap();
        assert_eq!(json["kind"], "passthrough");
    }

    #[test]
    fn test_definition_serialization_is_camel_case() {
        let def = NodeDefinition::new("text-prompt", NodeCategory::Input, "Prompt");
        let json = serde_json::to_string(&def).unwrap();
        assert!(json.contains("nodeType"));
        assert!(json.contains("defaultParameters"));
    }
}
