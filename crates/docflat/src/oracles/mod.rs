pub mod segmentation;
pub mod super_resolution;

pub use segmentation::{LuminanceSegmenter, MaskFileSegmenter};
pub use super_resolution::{CommandSuperResolver, NoSuperResolver, super_resolver_from_config};
