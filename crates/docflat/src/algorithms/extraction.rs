use image::imageops::{self, FilterType};
use image::{GrayImage, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::close;
use tracing::{debug, info, instrument};

use crate::{
    algorithms::contours::{external_contours, fill_contour, largest_contour},
    config::ExtractionConfig,
    error::{DocflatError, Result},
    types::ProbabilityMask,
};

/// Turns a segmentation mask into a single clean document region composited
/// onto a white background.
#[derive(Debug, Clone, Default)]
pub struct RegionExtractor {
    config: ExtractionConfig,
}

impl RegionExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Fails with `NoDocumentDetected` when the mask is absent, empty, or
    /// yields no contour.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn extract(&self, image: &RgbImage, mask: Option<&ProbabilityMask>) -> Result<RgbImage> {
        let mask = mask.ok_or(DocflatError::NoDocumentDetected)?;
        let cleaned = self.document_mask(image.width(), image.height(), mask)?;
        Ok(composite_on_white(image, &cleaned))
    }

    /// The cleaned binary document mask at `width` x `height`.
    pub fn document_mask(
        &self,
        width: u32,
        height: u32,
        mask: &ProbabilityMask,
    ) -> Result<GrayImage> {
        let binary = self.binary_mask(width, height, mask);
        if !binary.pixels().any(|p| p.0[0] > 0) {
            info!("Mask is entirely background");
            return Err(DocflatError::NoDocumentDetected);
        }

        let contours = external_contours(&binary);
        let document = largest_contour(&contours).ok_or(DocflatError::NoDocumentDetected)?;
        debug!(
            contours = contours.len(),
            area = document.area(),
            "Selected document contour"
        );

        let filled = fill_contour(width, height, document);
        let k = self
            .config
            .closing_radius
            .saturating_mul(self.config.closing_iterations);
        if k == 0 {
            return Ok(filled);
        }
        Ok(close(&filled, Norm::LInf, k))
    }

    /// Bounding box `(x, y, width, height)` of the largest mask region at
    /// `width` x `height`, or `None` when the mask has no foreground.
    pub fn document_bounds(
        &self,
        width: u32,
        height: u32,
        mask: &ProbabilityMask,
    ) -> Option<(u32, u32, u32, u32)> {
        let binary = self.binary_mask(width, height, mask);
        let contours = external_contours(&binary);
        let (min_x, min_y, max_x, max_y) = largest_contour(&contours)?.bounds()?;
        Some((
            min_x as u32,
            min_y as u32,
            (max_x - min_x + 1) as u32,
            (max_y - min_y + 1) as u32,
        ))
    }

    fn binary_mask(&self, width: u32, height: u32, mask: &ProbabilityMask) -> GrayImage {
        let binary = mask.binarize(self.config.mask_threshold);
        if binary.dimensions() == (width, height) {
            return binary;
        }
        debug!(
            from = ?binary.dimensions(),
            to = ?(width, height),
            "Resizing mask with nearest-neighbour sampling"
        );
        imageops::resize(&binary, width, height, FilterType::Nearest)
    }
}

/// Keep source colours inside `mask`, force everything else to pure white.
pub fn composite_on_white(image: &RgbImage, mask: &GrayImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        if mask.get_pixel(x, y).0[0] > 0 {
            *image.get_pixel(x, y)
        } else {
            Rgb([255, 255, 255])
        }
    })
}
