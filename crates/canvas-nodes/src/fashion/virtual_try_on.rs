//! Virtual Try-On
//!
//! Composites a garment onto a model photo through the provider's dedicated
//! try-on route. Both images must be present before anything is sent.

use canvas_engine::{
    AdapterKind, EngineError, ExecutionAdapter, ExecutionRequest, Node, NodeCategory,
    NodeDefinition, Port, PortType, ProviderBinding, Result,
};
use serde_json::{json, Value};

use crate::catalog::NodeDescriptor;
use crate::payload::{first_meaningful, parameter_or};

/// Virtual Try-On node
///
/// # Inputs
/// - `model` (required) - Model photo url
/// - `garment` (required) - Garment image url
///
/// # Parameters
/// - `category` - Garment category passed to the provider
///
/// # Outputs
/// - `image` - Url of the composited photo
pub struct VirtualTryOn;

impl VirtualTryOn {
    pub const NODE_TYPE: &'static str = "virtual-try-on";
    pub const PORT_MODEL: &'static str = "model";
    pub const PORT_GARMENT: &'static str = "garment";
    pub const PORT_IMAGE: &'static str = "image";

    const MODEL_KEYS: &'static [&'static str] = &["model", "modelImage", "person"];
    const GARMENT_KEYS: &'static [&'static str] = &["garment", "garmentImage"];
}

impl NodeDescriptor for VirtualTryOn {
    fn definition() -> NodeDefinition {
        NodeDefinition::new(Self::NODE_TYPE, NodeCategory::Fashion, "Virtual Try-On")
            .with_inputs(vec![
                Port::required(Self::PORT_MODEL, "Model Photo", PortType::Image),
                Port::required(Self::PORT_GARMENT, "Garment", PortType::Image),
            ])
            .with_outputs(vec![Port::optional(Self::PORT_IMAGE, "Result", PortType::Image)])
            .with_parameters(json!({ "category": "upper_body" }))
            .with_binding(ProviderBinding::Dedicated(AdapterKind::VirtualTryOn))
            .with_dimensions(300.0, 320.0)
    }
}

impl ExecutionAdapter for VirtualTryOn {
    fn kind(&self) -> AdapterKind {
        AdapterKind::VirtualTryOn
    }

    fn build_payload(&self, node: &Node, request: &ExecutionRequest) -> Result<Value> {
        let model = first_meaningful(&request.inputs, Self::MODEL_KEYS);
        let garment = first_meaningful(&request.inputs, Self::GARMENT_KEYS);

        let (model, garment) = match (model, garment) {
            (Some(model), Some(garment)) => (model, garment),
            (None, None) => {
                return Err(EngineError::precondition(
                    "Virtual try-on requires both a model photo and a garment image",
                ))
            }
            (None, Some(_)) => {
                return Err(EngineError::precondition("Virtual try-on requires a model photo"))
            }
            (Some(_), None) => {
                return Err(EngineError::precondition(
                    "Virtual try-on requires a garment image",
                ))
            }
        };

        Ok(json!({
            "nodeId": node.id,
            "modelImage": model,
            "garmentImage": garment,
            "category": parameter_or(&request.parameters, "category", json!("upper_body")),
        }))
    }
}
