//! Input nodes
//!
//! Leaf nodes whose value lives in their parameters. They complete locally
//! by publishing those parameters as their output.

mod garment_image;
mod image_upload;
mod model_photo;
mod text_prompt;

pub use garment_image::GarmentImage;
pub use image_upload::ImageUpload;
pub use model_photo::ModelPhoto;
pub use text_prompt::TextPrompt;
