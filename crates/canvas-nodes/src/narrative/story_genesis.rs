//! Story Genesis
//!
//! Develops a premise into a story object (title, logline, characters,
//! setting) through the provider's dedicated story route.

use canvas_engine::{
    AdapterKind, EngineError, ExecutionAdapter, ExecutionRequest, Node, NodeCategory,
    NodeDefinition, Port, PortType, ProviderBinding, Result,
};
use serde_json::{json, Value};

use crate::catalog::NodeDescriptor;
use crate::payload::{first_meaningful, parameter_or};

/// Story Genesis node
///
/// The premise comes from a connected prompt or, failing that, from the
/// node's own `premise` parameter.
///
/// # Inputs
/// - `premise` (optional) - Premise text
///
/// # Outputs
/// - `story` - The generated story object
pub struct StoryGenesis;

impl StoryGenesis {
    pub const NODE_TYPE: &'static str = "story-genesis";
    pub const PORT_PREMISE: &'static str = "premise";
    pub const PORT_STORY: &'static str = "story";
}

impl NodeDescriptor for StoryGenesis {
    fn definition() -> NodeDefinition {
        NodeDefinition::new(Self::NODE_TYPE, NodeCategory::Narrative, "Story Genesis")
            .with_inputs(vec![Port::optional(Self::PORT_PREMISE, "Premise", PortType::Text)])
            .with_outputs(vec![Port::optional(Self::PORT_STORY, "Story", PortType::Story)])
            .with_parameters(json!({
                "premise": "",
                "genre": "",
                "tone": "",
                "length": "short"
            }))
            .with_binding(ProviderBinding::Dedicated(AdapterKind::StoryGenesis))
            .with_dimensions(320.0, 260.0)
    }
}

impl ExecutionAdapter for StoryGenesis {
    fn kind(&self) -> AdapterKind {
        AdapterKind::StoryGenesis
    }

    fn build_payload(&self, node: &Node, request: &ExecutionRequest) -> Result<Value> {
        let premise = first_meaningful(&request.inputs, &[Self::PORT_PREMISE, "text", "prompt"])
            .or_else(|| first_meaningful(&request.parameters, &["premise"]))
            .ok_or_else(|| EngineError::precondition("Story genesis requires a premise"))?;

        Ok(json!({
            "nodeId": node.id,
            "premise": premise,
            "genre": parameter_or(&request.parameters, "genre", Value::Null),
            "tone": parameter_or(&request.parameters, "tone", Value::Null),
            "length": parameter_or(&request.parameters, "length", json!("short")),
        }))
    }
}
