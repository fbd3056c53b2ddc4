//! Character
//!
//! A named character with a description and an optional reference image.
//! Published as a whole object so downstream nodes keep every field.

use canvas_engine::{NodeCategory, NodeDefinition, Port, PortType, ProviderBinding};
use serde_json::json;

use crate::catalog::NodeDescriptor;

/// Character node
///
/// # Parameters
/// - `character` - `{name, description, image}`
///
/// # Outputs
/// - `character` - The character object
pub struct Character;

impl Character {
    pub const NODE_TYPE: &'static str = "character";
    pub const PORT_CHARACTER: &'static str = "character";
}

impl NodeDescriptor for Character {
    fn definition() -> NodeDefinition {
        NodeDefinition::new(Self::NODE_TYPE, NodeCategory::Entity, "Character")
            .with_outputs(vec![Port::optional(
                Self::PORT_CHARACTER,
                "Character",
                PortType::Character,
            )])
            .with_parameters(json!({
                "character": { "name": "", "description": "", "image": "" }
            }))
            .with_binding(ProviderBinding::Passthrough)
    }
}
