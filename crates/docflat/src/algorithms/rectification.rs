use image::{GrayImage, Luma, Rgb, RgbImage, imageops};
use imageproc::contrast::{otsu_level, threshold};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use tracing::{debug, info, instrument, warn};

use crate::{
    algorithms::contours::{external_contours, largest_contour},
    algorithms::quad::{min_area_corners, order_points},
    config::RectificationConfig,
    error::{DocflatError, Result, SoftFailure},
    types::Quadrilateral,
};

/// Maximum distance, in destination pixels, a solved homography may place a
/// source corner away from its target.
const CORNER_TOLERANCE: f64 = 0.5;

/// A 3x3 homography mapping a quadrilateral onto an axis-aligned
/// `width` x `height` rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct RectificationTransform {
    pub matrix: Matrix3<f64>,
    pub width: u32,
    pub height: u32,
}

impl RectificationTransform {
    /// Solve for the homography taking `quad` onto
    /// `(0,0), (w-1,0), (w-1,h-1), (0,h-1)`.
    pub fn solve(quad: &Quadrilateral, width: u32, height: u32) -> std::result::Result<Self, String> {
        let right = width.saturating_sub(1) as f64;
        let bottom = height.saturating_sub(1) as f64;
        let dst = [[0.0, 0.0], [right, 0.0], [right, bottom], [0.0, bottom]];
        let src = quad.corners().map(|[x, y]| [x as f64, y as f64]);

        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for i in 0..4 {
            let [x, y] = src[i];
            let [u, v] = dst[i];

            // u = (h0 x + h1 y + h2) / (h6 x + h7 y + 1)
            a[(i, 0)] = x;
            a[(i, 1)] = y;
            a[(i, 2)] = 1.0;
            a[(i, 6)] = -x * u;
            a[(i, 7)] = -y * u;
            b[i] = u;

            // v = (h3 x + h4 y + h5) / (h6 x + h7 y + 1)
            a[(i + 4, 3)] = x;
            a[(i + 4, 4)] = y;
            a[(i + 4, 5)] = 1.0;
            a[(i + 4, 6)] = -x * v;
            a[(i + 4, 7)] = -y * v;
            b[i + 4] = v;
        }

        let h = a
            .lu()
            .solve(&b)
            .ok_or_else(|| "corner system is singular".to_string())?;
        if h.iter().any(|c| !c.is_finite()) {
            return Err("homography has non-finite coefficients".into());
        }

        let matrix = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
        if matrix.try_inverse().is_none() {
            return Err("homography is not invertible".into());
        }

        let transform = Self { matrix, width, height };
        for (s, d) in src.iter().zip(dst.iter()) {
            let p = transform
                .project(s[0], s[1])
                .ok_or_else(|| "corner projects to infinity".to_string())?;
            let err = ((p[0] - d[0]).powi(2) + (p[1] - d[1]).powi(2)).sqrt();
            if err > CORNER_TOLERANCE {
                return Err(format!("corner reprojection error {err:.3}px"));
            }
        }
        Ok(transform)
    }

    /// Map a source point into the destination rectangle.
    pub fn project(&self, x: f64, y: f64) -> Option<[f64; 2]> {
        let p = self.matrix * Vector3::new(x, y, 1.0);
        if p[2].abs() < 1e-12 || !p[2].is_finite() {
            return None;
        }
        Some([p[0] / p[2], p[1] / p[2]])
    }

    fn to_projection(&self) -> Option<Projection> {
        let m = &self.matrix;
        Projection::from_matrix([
            m[(0, 0)] as f32,
            m[(0, 1)] as f32,
            m[(0, 2)] as f32,
            m[(1, 0)] as f32,
            m[(1, 1)] as f32,
            m[(1, 2)] as f32,
            m[(2, 0)] as f32,
            m[(2, 1)] as f32,
            m[(2, 2)] as f32,
        ])
    }

    /// Resample `image` into the destination rectangle (inverse mapping,
    /// bilinear interpolation).
    pub fn warp(&self, image: &RgbImage, fill: Rgb<u8>) -> std::result::Result<RgbImage, String> {
        let projection = self
            .to_projection()
            .ok_or_else(|| "projection is not invertible".to_string())?;
        let mut out = RgbImage::new(self.width, self.height);
        warp_into(image, &projection, Interpolation::Bilinear, fill, &mut out);
        Ok(out)
    }
}

/// Outcome of a rectification attempt that found content.
#[derive(Debug, Clone)]
pub struct Rectification {
    pub image: RgbImage,
    pub quad: Quadrilateral,
    /// Set when the warp could not be computed and `image` is the unchanged input.
    pub soft_failure: Option<SoftFailure>,
}

/// Straightens the document in an image whose background is (near-)white.
#[derive(Debug, Clone, Default)]
pub struct Rectifier {
    config: RectificationConfig,
}

impl Rectifier {
    pub fn new(config: RectificationConfig) -> Self {
        Self { config }
    }

    /// Fails with `NoContentRegion` when nothing but background is found.
    /// Numeric problems are reported through `Rectification::soft_failure`.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn rectify(&self, image: &RgbImage) -> Result<Rectification> {
        let binary = self.content_mask(image);
        let contours = external_contours(&binary);
        let region = largest_contour(&contours).ok_or(DocflatError::NoContentRegion)?;
        let corners = min_area_corners(region).ok_or(DocflatError::NoContentRegion)?;
        let quad = order_points(corners);
        let (width, height) = quad.target_size();
        debug!(?quad, width, height, area = region.area(), "Content quadrilateral");

        let warped = RectificationTransform::solve(&quad, width, height)
            .and_then(|transform| transform.warp(image, Rgb(self.config.fill)));

        match warped {
            Ok(rectified) => {
                info!(width, height, "Rectified document");
                Ok(Rectification {
                    image: rectified,
                    quad,
                    soft_failure: None,
                })
            }
            Err(reason) => {
                warn!(%reason, "Rectification failed numerically; keeping unrectified image");
                Ok(Rectification {
                    image: image.clone(),
                    quad,
                    soft_failure: Some(SoftFailure::RectificationNumericFailure { reason }),
                })
            }
        }
    }

    /// Binary content mask: non-white pixels, split from dark clutter with Otsu.
    pub fn content_mask(&self, image: &RgbImage) -> GrayImage {
        let gray = imageops::grayscale(image);
        let white = self.config.white_threshold;

        let foreground = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            let v = gray.get_pixel(x, y).0[0];
            if v > white { Luma([0u8]) } else { Luma([v]) }
        });

        let level = otsu_level(&foreground);
        let binary = threshold(&foreground, level);
        debug!(level, "Otsu level for content mask");
        if binary.pixels().any(|p| p.0[0] > 0) {
            return binary;
        }

        // A single flat tone leaves Otsu nothing to split.
        GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            if gray.get_pixel(x, y).0[0] > white {
                Luma([0u8])
            } else {
                Luma([255u8])
            }
        })
    }
}
