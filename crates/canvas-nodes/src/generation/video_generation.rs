//! Video Generation
//!
//! Usually completes asynchronously: the provider returns a job id and the
//! executor polls until the video is ready.

use canvas_engine::{NodeCategory, NodeDefinition, Port, PortType};
use serde_json::json;

use crate::catalog::NodeDescriptor;

/// Video Generation node
///
/// # Inputs
/// - `prompt` (required) - Prompt text
/// - `image` (optional) - First frame
///
/// # Outputs
/// - `video` - Url of the generated video
pub struct VideoGeneration;

impl VideoGeneration {
    pub const NODE_TYPE: &'static str = "video-generation";
    pub const PORT_PROMPT: &'static str = "prompt";
    pub const PORT_IMAGE: &'static str = "image";
    pub const PORT_VIDEO: &'static str = "video";
}

impl NodeDescriptor for VideoGeneration {
    fn definition() -> NodeDefinition {
        NodeDefinition::new(Self::NODE_TYPE, NodeCategory::Video, "Video Generation")
            .with_inputs(vec![
                Port::required(Self::PORT_PROMPT, "Prompt", PortType::Text),
                Port::optional(Self::PORT_IMAGE, "First Frame", PortType::Image),
            ])
            .with_outputs(vec![Port::optional(Self::PORT_VIDEO, "Video", PortType::Video)])
            .with_parameters(json!({ "duration": 5, "aspectRatio": "16:9" }))
            .with_dimensions(320.0, 280.0)
    }
}
