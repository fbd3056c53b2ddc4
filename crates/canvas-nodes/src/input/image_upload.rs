//! Image Upload
//!
//! An uploaded or library image used as a reference downstream.

use canvas_engine::{NodeCategory, NodeDefinition, Port, PortType, ProviderBinding};
use serde_json::json;

use crate::catalog::NodeDescriptor;

/// Image Upload node
///
/// # Parameters
/// - `image` - Url of the uploaded image
///
/// # Outputs
/// - `image` - Url of the uploaded image
pub struct ImageUpload;

impl ImageUpload {
    pub const NODE_TYPE: &'static str = "image-upload";
    pub const PORT_IMAGE: &'static str = "image";
}

impl NodeDescriptor for ImageUpload {
    fn definition() -> NodeDefinition {
        NodeDefinition::new(Self::NODE_TYPE, NodeCategory::Input, "Image Upload")
            .with_outputs(vec![Port::optional(Self::PORT_IMAGE, "Image", PortType::Image)])
            .with_parameters(json!({ "image": "" }))
            .with_binding(ProviderBinding::Passthrough)
    }
}
