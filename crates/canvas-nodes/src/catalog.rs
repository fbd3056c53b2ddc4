//! Built-in node catalog
//!
//! Hosts build the registry explicitly with [`builtin_registry`] and the
//! dedicated adapters with [`builtin_adapters`].

use std::sync::Arc;

use canvas_engine::{AdapterRegistry, NodeDefinition, NodeRegistry};

use crate::entity::{Character, CharacterSheet};
use crate::fashion::VirtualTryOn;
use crate::generation::{ImageGeneration, VideoGeneration};
use crate::input::{GarmentImage, ImageUpload, ModelPhoto, TextPrompt};
use crate::narrative::{StoryGenesis, StoryStructure};

/// A node type that can describe itself
pub trait NodeDescriptor {
    /// Definition used to create new nodes of this type
    fn definition() -> NodeDefinition;
}

/// Definitions of every built-in node type
pub fn builtin_definitions() -> Vec<NodeDefinition> {
    vec![
        TextPrompt::definition(),
        ImageUpload::definition(),
        ModelPhoto::definition(),
        GarmentImage::definition(),
        Character::definition(),
        CharacterSheet::definition(),
        StoryGenesis::definition(),
        StoryStructure::definition(),
        ImageGeneration::definition(),
        VideoGeneration::definition(),
        VirtualTryOn::definition(),
    ]
}

/// Registry holding every built-in node type
pub fn builtin_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    for definition in builtin_definitions() {
        registry.register(definition);
    }
    log::debug!("Registered {} built-in node types", registry.node_types().len());
    registry
}

/// Adapters for every dedicated provider route
pub fn builtin_adapters() -> AdapterRegistry {
    let mut adapters = AdapterRegistry::new();
    adapters.register(Arc::new(VirtualTryOn));
    adapters.register(Arc::new(StoryGenesis));
    adapters.register(Arc::new(CharacterSheet));
    adapters
}
