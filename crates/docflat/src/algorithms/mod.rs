pub mod contours;
pub mod crop;
pub mod enhance;
pub mod extraction;
pub mod quad;
pub mod rectification;
pub mod resolution;

pub use contours::{Contour, external_contours, fill_contour, largest_contour};
pub use crop::crop_to_content;
pub use enhance::{clahe, enhance_document};
pub use extraction::{RegionExtractor, composite_on_white};
pub use quad::{min_area_corners, order_points};
pub use rectification::{Rectification, RectificationTransform, Rectifier};
pub use resolution::{
    Normalization, QualityReport, ResolutionNormalizer, UpscalePath, resample, unsharp_mask,
};
