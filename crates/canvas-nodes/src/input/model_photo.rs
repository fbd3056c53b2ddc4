//! Model Photo
//!
//! Photo of the person who wears the garment in a virtual try-on.

use canvas_engine::{NodeCategory, NodeDefinition, Port, PortType, ProviderBinding};
use serde_json::json;

use crate::catalog::NodeDescriptor;

/// Model Photo node
///
/// # Parameters
/// - `image` - Url of the model photo
/// - `pose` - Optional pose hint
///
/// # Outputs
/// - `image` - Url of the model photo
pub struct ModelPhoto;

impl ModelPhoto {
    pub const NODE_TYPE: &'static str = "model-photo";
    pub const PORT_IMAGE: &'static str = "image";
}

impl NodeDescriptor for ModelPhoto {
    fn definition() -> NodeDefinition {
        NodeDefinition::new(Self::NODE_TYPE, NodeCategory::Input, "Model Photo")
            .with_outputs(vec![Port::optional(Self::PORT_IMAGE, "Photo", PortType::Image)])
            .with_parameters(json!({ "image": "", "pose": "" }))
            .with_binding(ProviderBinding::Passthrough)
    }
}
