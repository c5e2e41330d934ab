use std::path::{Path, PathBuf};

use image::{GrayImage, Luma, RgbImage, imageops};
use tracing::debug;

use crate::{
    error::{DocflatError, Result},
    traits::Segmenter,
    types::ProbabilityMask,
};

/// Serves a precomputed mask raster from disk, whatever image it is asked about.
///
/// Gray values map to probabilities as `value / 255`.
#[derive(Debug, Clone)]
pub struct MaskFileSegmenter {
    path: PathBuf,
}

impl MaskFileSegmenter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Segmenter for MaskFileSegmenter {
    fn segment(&self, _image: &RgbImage) -> Result<Option<ProbabilityMask>> {
        let gray = image::open(&self.path)
            .map_err(|source| DocflatError::UnreadableInput {
                path: self.path.clone(),
                source,
            })?
            .to_luma8();
        debug!(path = %self.path.display(), size = ?gray.dimensions(), "Loaded mask");
        ProbabilityMask::from_gray(&gray).map(Some)
    }
}

/// Marks every pixel brighter than `level` as document.
///
/// Works for light paper photographed on a dark surface. Reports nothing
/// detected when no pixel passes.
#[derive(Debug, Clone, Copy)]
pub struct LuminanceSegmenter {
    pub level: u8,
}

impl LuminanceSegmenter {
    pub fn new(level: u8) -> Self {
        Self { level }
    }
}

impl Default for LuminanceSegmenter {
    fn default() -> Self {
        Self { level: 127 }
    }
}

impl Segmenter for LuminanceSegmenter {
    fn segment(&self, image: &RgbImage) -> Result<Option<ProbabilityMask>> {
        let gray = imageops::grayscale(image);
        let mask = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            if gray.get_pixel(x, y).0[0] > self.level {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });

        if !mask.pixels().any(|p| p.0[0] > 0) {
            return Ok(None);
        }
        ProbabilityMask::from_gray(&mask).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    #[test]
    fn test_luminance_segmenter_marks_bright_pixels() {
        let mut image = RgbImage::from_pixel(60, 40, Rgb([20, 20, 20]));
        draw_filled_rect_mut(&mut image, Rect::at(10, 5).of_size(30, 20), Rgb([220, 220, 220]));

        let mask = LuminanceSegmenter::default().segment(&image).unwrap().unwrap();
        assert_eq!(mask.dimensions(), (60, 40));
        assert_eq!(mask.get(20, 10), 1.0);
        assert_eq!(mask.get(2, 2), 0.0);
    }

    #[test]
    fn test_luminance_segmenter_dark_image_detects_nothing() {
        let image = RgbImage::from_pixel(16, 16, Rgb([10, 10, 10]));
        assert!(LuminanceSegmenter::new(100).segment(&image).unwrap().is_none());
    }

    #[test]
    fn test_mask_file_segmenter_reads_probabilities() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");
        let mut gray = GrayImage::new(8, 4);
        gray.put_pixel(3, 2, Luma([255]));
        gray.put_pixel(4, 2, Luma([51]));
        gray.save(&path).unwrap();

        let segmenter = MaskFileSegmenter::new(&path);
        let mask = segmenter
            .segment(&RgbImage::new(1, 1))
            .unwrap()
            .unwrap();
        assert_eq!(mask.dimensions(), (8, 4));
        assert_eq!(mask.get(3, 2), 1.0);
        assert!((mask.get(4, 2) - 0.2).abs() < 1e-6);
        assert_eq!(mask.get(0, 0), 0.0);
    }

    #[test]
    fn test_mask_file_segmenter_missing_file() {
        let segmenter = MaskFileSegmenter::new("/nonexistent/mask.png");
        let err = segmenter.segment(&RgbImage::new(1, 1)).unwrap_err();
        assert!(matches!(err, DocflatError::UnreadableInput { .. }));
    }
}
