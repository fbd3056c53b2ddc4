//! Image Generation

use canvas_engine::{NodeCategory, NodeDefinition, Port, PortType};
use serde_json::json;

use crate::catalog::NodeDescriptor;

/// Image Generation node
///
/// # Inputs
/// - `prompt` (required) - Prompt text
/// - `reference` (optional) - Content reference image
/// - `styleReference` (optional) - Style reference image
/// - `character` (optional) - Character to keep consistent
///
/// # Outputs
/// - `image` - Generated image url(s)
pub struct ImageGeneration;

impl ImageGeneration {
    pub const NODE_TYPE: &'static str = "image-generation";
    pub const PORT_PROMPT: &'static str = "prompt";
    pub const PORT_REFERENCE: &'static str = "reference";
    pub const PORT_STYLE: &'static str = "styleReference";
    pub const PORT_CHARACTER: &'static str = "character";
    pub const PORT_IMAGE: &'static str = "image";
}

impl NodeDescriptor for ImageGeneration {
    fn definition() -> NodeDefinition {
        NodeDefinition::new(Self::NODE_TYPE, NodeCategory::Image, "Image Generation")
            .with_inputs(vec![
                Port::required(Self::PORT_PROMPT, "Prompt", PortType::Text),
                Port::optional(Self::PORT_REFERENCE, "Reference", PortType::Image),
                Port::optional(Self::PORT_STYLE, "Style Reference", PortType::Image),
                Port::optional(Self::PORT_CHARACTER, "Character", PortType::Character),
            ])
            .with_outputs(vec![Port::optional(Self::PORT_IMAGE, "Image", PortType::Image)])
            .with_parameters(json!({ "aspectRatio": "1:1", "numImages": 1 }))
            .with_dimensions(300.0, 320.0)
    }
}
