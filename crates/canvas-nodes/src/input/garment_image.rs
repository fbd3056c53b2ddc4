//! Garment Image
//!
//! Flat-lay or product shot of a garment.

use canvas_engine::{NodeCategory, NodeDefinition, Port, PortType, ProviderBinding};
use serde_json::json;

use crate::catalog::NodeDescriptor;

/// Garment Image node
///
/// # Parameters
/// - `image` - Url of the garment image
/// - `garmentType` - e.g. `upper_body`, `lower_body`, `dress`
///
/// # Outputs
/// - `image` - Url of the garment image
pub struct GarmentImage;

impl GarmentImage {
    pub const NODE_TYPE: &'static str = "garment-image";
    pub const PORT_IMAGE: &'static str = "image";
}

impl NodeDescriptor for GarmentImage {
    fn definition() -> NodeDefinition {
        NodeDefinition::new(Self::NODE_TYPE, NodeCategory::Input, "Garment Image")
            .with_outputs(vec![Port::optional(Self::PORT_IMAGE, "Garment", PortType::Image)])
            .with_parameters(json!({ "image": "", "garmentType": "upper_body" }))
            .with_binding(ProviderBinding::Passthrough)
    }
}
