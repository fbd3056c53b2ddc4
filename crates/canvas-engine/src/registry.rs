//! Node type registry
//!
//! Maps node-type strings to their `NodeDefinition`. Hosts build a registry
//! explicitly (see `canvas-nodes` for the built-in catalog) and hand it to the
//! graph store; there is no process-global registration.
//!
//! # Usage
//!
//! ```ignore
//! use canvas_engine::{NodeRegistry, NodeDefinition, NodeCategory};
//!
//! let mut registry = NodeRegistry::new();
//! registry.register(NodeDefinition::new("text-prompt", NodeCategory::Input, "Prompt"));
//! let node = registry.instantiate("text-prompt", "n1", Position::new(0.0, 0.0))?;
//! ```

use std::collections::HashMap;

use crate::descriptor::{NodeDefinition, ProviderBinding};
use crate::error::{EngineError, Result};
use crate::types::{Node, NodeCategory, NodeStatus, Position};

/// Registry of node definitions keyed by node type
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    entries: HashMap<String, NodeDefinition>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a node definition
    pub fn register(&mut self, definition: NodeDefinition) {
        self.entries.insert(definition.node_type.clone(), definition);
    }

    /// Get the definition for a node type
    pub fn get_definition(&self, node_type: &str) -> Option<&NodeDefinition> {
        self.entries.get(node_type)
    }

    /// Execution route for a node type
    ///
    /// Unknown types fall back to the uniform provider call.
    pub fn binding_for(&self, node_type: &str) -> ProviderBinding {
        self.entries
            .get(node_type)
            .map(|d| d.provider_binding)
            .unwrap_or_default()
    }

    /// Get all registered definitions
    pub fn all_definitions(&self) -> Vec<&NodeDefinition> {
        self.entries.values().collect()
    }

    /// Get definitions grouped by category
    pub fn definitions_by_category(&self) -> HashMap<NodeCategory, Vec<&NodeDefinition>> {
        let mut grouped: HashMap<NodeCategory, Vec<&NodeDefinition>> = HashMap::new();
        for definition in self.entries.values() {
            grouped.entry(definition.category).or_default().push(definition);
        }
        grouped
    }

    /// Check if a node type is registered
    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    /// List all registered node type strings
    pub fn node_types(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` if they share the same node_type.
    pub fn merge(&mut self, other: NodeRegistry) {
        self.entries.extend(other.entries);
    }

    /// Build a new node of the given type with its default ports and parameters
    pub fn instantiate(
        &self,
        node_type: &str,
        id: impl Into<String>,
        position: Position,
    ) -> Result<Node> {
        let definition = self
            .get_definition(node_type)
            .ok_or_else(|| EngineError::UnknownNodeType(node_type.to_string()))?;

        Ok(Node {
            id: id.into(),
            node_type: definition.node_type.clone(),
            category: definition.category,
            position,
            dimensions: definition.default_dimensions,
            inputs: definition.default_inputs.clone(),
            outputs: definition.default_outputs.clone(),
            parameters: definition.default_parameters.clone(),
            status: NodeStatus::Idle,
            cached_output: None,
            last_execution: None,
        })
    }
}
