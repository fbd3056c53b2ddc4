//! Text Prompt
//!
//! User-entered text that feeds prompts of downstream nodes.

use canvas_engine::{NodeCategory, NodeDefinition, Port, PortType, ProviderBinding};
use serde_json::json;

use crate::catalog::NodeDescriptor;

/// Text Prompt node
///
/// # Parameters
/// - `text` - The prompt text
///
/// # Outputs
/// - `text` - The prompt text
pub struct TextPrompt;

impl TextPrompt {
    pub const NODE_TYPE: &'static str = "text-prompt";
    /// Port ID for the text output
    pub const PORT_TEXT: &'static str = "text";
}

impl NodeDescriptor for TextPrompt {
    fn definition() -> NodeDefinition {
        NodeDefinition::new(Self::NODE_TYPE, NodeCategory::Input, "Text Prompt")
            .with_outputs(vec![Port::optional(Self::PORT_TEXT, "Text", PortType::Text)])
            .with_parameters(json!({ "text": "" }))
            .with_binding(ProviderBinding::Passthrough)
            .with_dimensions(280.0, 160.0)
    }
}
