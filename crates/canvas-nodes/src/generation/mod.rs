//! Generation nodes
//!
//! Image and video generation through the provider's uniform execute call.

mod image_generation;
mod video_generation;

pub use image_generation::ImageGeneration;
pub use video_generation::VideoGeneration;
