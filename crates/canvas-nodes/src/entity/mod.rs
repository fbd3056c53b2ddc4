//! Entity nodes
//!
//! Reusable characters and the sheets generated from them.

mod character;
mod character_sheet;

pub use character::Character;
pub use character_sheet::CharacterSheet;
