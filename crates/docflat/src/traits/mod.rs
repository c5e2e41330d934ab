use image::RgbImage;
use crate::{
    error::{Result, SuperResolutionError},
    types::ProbabilityMask,
};

/// Trait for document segmentation oracles
pub trait Segmenter: Send + Sync {
    /// Return the document probability mask, or `None` when nothing was detected.
    ///
    /// The mask may have a different resolution than `image`; the extractor
    /// resizes it with nearest-neighbour sampling.
    fn segment(&self, image: &RgbImage) -> Result<Option<ProbabilityMask>>;
}

/// Trait for super-resolution oracles
pub trait SuperResolver: Send + Sync {
    /// Short name used in logs and reports
    fn name(&self) -> &str;

    /// Upscale `image` by `scale`. The result must be exactly `scale` times larger.
    fn super_resolve(
        &self,
        image: &RgbImage,
        scale: u32,
    ) -> std::result::Result<RgbImage, SuperResolutionError>;
}

impl<T: Segmenter + ?Sized> Segmenter for Box<T> {
    fn segment(&self, image: &RgbImage) -> Result<Option<ProbabilityMask>> {
        (**self).segment(image)
    }
}

impl<T: SuperResolver + ?Sized> SuperResolver for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn super_resolve(
        &self,
        image: &RgbImage,
        scale: u32,
    ) -> std::result::Result<RgbImage, SuperResolutionError> {
        (**self).super_resolve(image, scale)
    }
}
