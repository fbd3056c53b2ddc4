//! Narrative nodes
//!
//! Story development: generating a story from a premise and structuring it.

mod story_genesis;
mod story_structure;

pub use story_genesis::StoryGenesis;
pub use story_structure::StoryStructure;
