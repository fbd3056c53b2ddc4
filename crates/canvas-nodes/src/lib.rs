//! Canvas Nodes
//!
//! Built-in node types for the canvas engine. Each node type describes its
//! default ports, parameters and execution route; node types with a
//! dedicated provider route also implement the request shaping for it.
//!
//! # Categories
//!
//! - **Input**: Prompts and uploaded images, published from parameters
//! - **Entity**: Characters and character sheets
//! - **Narrative**: Story development
//! - **Generation**: Image and video generation
//! - **Fashion**: Virtual try-on
//!
//! Connection actions (`actions`) combine two selected nodes into a new
//! downstream node.

pub mod actions;
pub mod catalog;
pub mod entity;
pub mod fashion;
pub mod generation;
pub mod input;
pub mod narrative;
mod payload;

pub use actions::{ActionCheck, ConnectionAction};
pub use catalog::{builtin_adapters, builtin_definitions, builtin_registry, NodeDescriptor};
pub use entity::*;
pub use fashion::*;
pub use generation::*;
pub use input::*;
pub use narrative::*;
