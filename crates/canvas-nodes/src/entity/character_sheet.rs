//! Character Sheet
//!
//! Generates a multi-view reference sheet for a character through the
//! provider's dedicated character-sheet route.

use canvas_engine::{
    AdapterKind, EngineError, ExecutionAdapter, ExecutionRequest, Node, NodeCategory,
    NodeDefinition, Port, PortType, ProviderBinding, Result,
};
use serde_json::{json, Value};

use crate::catalog::NodeDescriptor;
use crate::payload::{first_meaningful, parameter_or};

/// Character Sheet node
///
/// # Inputs
/// - `character` (required) - Character object or description
/// - `styleReference` (optional) - Style reference image
///
/// # Parameters
/// - `views` - Views to render
///
/// # Outputs
/// - `sheet` - Url of the generated sheet
pub struct CharacterSheet;

impl CharacterSheet {
    pub const NODE_TYPE: &'static str = "character-sheet";
    pub const PORT_CHARACTER: &'static str = "character";
    pub const PORT_STYLE: &'static str = "styleReference";
    pub const PORT_SHEET: &'static str = "sheet";
}

impl NodeDescriptor for CharacterSheet {
    fn definition() -> NodeDefinition {
        NodeDefinition::new(Self::NODE_TYPE, NodeCategory::Entity, "Character Sheet")
            .with_inputs(vec![
                Port::required(Self::PORT_CHARACTER, "Character", PortType::Character),
                Port::optional(Self::PORT_STYLE, "Style", PortType::Image),
            ])
            .with_outputs(vec![Port::optional(Self::PORT_SHEET, "Sheet", PortType::Image)])
            .with_parameters(json!({ "views": ["front", "side", "back"] }))
            .with_binding(ProviderBinding::Dedicated(AdapterKind::CharacterSheet))
            .with_dimensions(320.0, 240.0)
    }
}

impl ExecutionAdapter for CharacterSheet {
    fn kind(&self) -> AdapterKind {
        AdapterKind::CharacterSheet
    }

    fn build_payload(&self, node: &Node, request: &ExecutionRequest) -> Result<Value> {
        let character = first_meaningful(
            &request.inputs,
            &[Self::PORT_CHARACTER, "characterReference"],
        )
        .ok_or_else(|| EngineError::precondition("Character sheet requires a connected character"))?;

        let mut payload = json!({
            "nodeId": node.id,
            "character": character,
            "views": parameter_or(&request.parameters, "views", json!(["front"])),
        });
        if let Some(style) = first_meaningful(&request.inputs, &[Self::PORT_STYLE, "style"]) {
            payload["styleReference"] = style.clone();
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_engine::BoardBuilder;

    fn node() -> Node {
        BoardBuilder::new("b")
            .add_defined("sheet", &CharacterSheet::definition(), (0.0, 0.0))
            .build()
            .nodes
            .remove(0)
    }

    #[test]
    fn test_requires_character() {
        let err = CharacterSheet
            .build_payload(&node(), &ExecutionRequest::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "Character sheet requires a connected character");
    }

    #[test]
    fn test_payload_carries_character_and_views() {
        let node = node();
        let request = ExecutionRequest {
            inputs: json!({"character": {"name": "Ada"}, "style": "s.png"})
                .as_object()
                .unwrap()
                .clone(),
            parameters: node.parameters.clone(),
        };
        let payload = CharacterSheet.build_payload(&node, &request).unwrap();
        assert_eq!(payload["character"]["name"], "Ada");
        assert_eq!(payload["views"], json!(["front", "side", "back"]));
        assert_eq!(payload["styleReference"], "s.png");
    }
}
