//! Story Structure
//!
//! Breaks a story into acts and beats using a chosen structure template.

use canvas_engine::{NodeCategory, NodeDefinition, Port, PortType};
use serde_json::json;

use crate::catalog::NodeDescriptor;

/// Story Structure node
///
/// Receives the story object on `story`; the flattened `Story Context` text
/// travels alongside it for prompt-based providers.
///
/// # Inputs
/// - `story` (required) - Story object
///
/// # Outputs
/// - `outline` - Structured outline
pub struct StoryStructure;

impl StoryStructure {
    pub const NODE_TYPE: &'static str = "story-structure";
    pub const PORT_STORY: &'static str = "story";
    pub const PORT_OUTLINE: &'static str = "outline";
}

impl NodeDescriptor for StoryStructure {
    fn definition() -> NodeDefinition {
        NodeDefinition::new(Self::NODE_TYPE, NodeCategory::Narrative, "Story Structure")
            .with_inputs(vec![Port::required(Self::PORT_STORY, "Story", PortType::Story)])
            .with_outputs(vec![Port::optional(
                Self::PORT_OUTLINE,
                "Outline",
                PortType::Outline,
            )])
            .with_parameters(json!({ "structure": "three-act" }))
    }
}
