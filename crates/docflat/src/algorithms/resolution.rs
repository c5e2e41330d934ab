use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb, RgbImage};
use imageproc::filter::{filter3x3, separable_filter_equal};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::UnsharpParams,
    error::{SoftFailure, SuperResolutionError},
    traits::SuperResolver,
    types::ScaleDecision,
};

/// Which path produced the normalized image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Display, IntoStaticStr)]
#[serde(tag = "type", content = "oracle", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UpscalePath {
    /// Already high resolution
    Skipped,
    /// The super-resolution oracle succeeded
    SuperResolution(String),
    /// Lanczos resampling plus unsharp mask
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Normalization {
    pub image: RgbImage,
    pub decision: ScaleDecision,
    pub path: UpscalePath,
    pub soft_failure: Option<SoftFailure>,
}

/// Upscales low-resolution images, preferring the oracle and falling back to
/// deterministic resampling. Never fails.
#[derive(Debug, Clone, Default)]
pub struct ResolutionNormalizer {
    unsharp: UnsharpParams,
}

impl ResolutionNormalizer {
    pub fn new(unsharp: UnsharpParams) -> Self {
        Self { unsharp }
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height(), oracle = oracle.name()))]
    pub fn normalize(&self, image: &RgbImage, oracle: &dyn SuperResolver) -> Normalization {
        let (width, height) = image.dimensions();
        let decision = ScaleDecision::for_dimensions(width, height);
        if decision.skip {
            info!(width, height, "Image already high resolution, skipping upscaling");
            return Normalization {
                image: image.clone(),
                decision,
                path: UpscalePath::Skipped,
                soft_failure: None,
            };
        }

        let scale = decision.scale_factor;
        info!(width, height, scale, "Upscaling image");

        let attempt = oracle.super_resolve(image, scale).and_then(|upscaled| {
            let expected = (width * scale, height * scale);
            if upscaled.dimensions() == expected {
                Ok(upscaled)
            } else {
                Err(SuperResolutionError::InvalidOutput {
                    expected,
                    actual: upscaled.dimensions(),
                })
            }
        });

        match attempt {
            Ok(upscaled) => Normalization {
                image: upscaled,
                decision,
                path: UpscalePath::SuperResolution(oracle.name().to_string()),
                soft_failure: None,
            },
            Err(err) => {
                match &err {
                    SuperResolutionError::Unavailable(reason) => {
                        warn!(%reason, "Super-resolution unavailable, using resampling fallback")
                    }
                    SuperResolutionError::Failed(_) | SuperResolutionError::InvalidOutput { .. } => {
                        warn!(error = %err, "Super-resolution failed, using resampling fallback")
                    }
                }
                Normalization {
                    image: resample(image, scale, &self.unsharp),
                    decision,
                    path: UpscalePath::Fallback,
                    soft_failure: Some(err.into()),
                }
            }
        }
    }
}

/// Lanczos upscale by `scale` followed by an unsharp mask.
pub fn resample(image: &RgbImage, scale: u32, unsharp: &UnsharpParams) -> RgbImage {
    let (width, height) = image.dimensions();
    let (new_width, new_height) = (width * scale, height * scale);
    debug!(new_width, new_height, "Lanczos resampling");
    let upscaled = imageops::resize(image, new_width, new_height, FilterType::Lanczos3);
    unsharp_mask(&upscaled, unsharp)
}

/// `sharpened = (amount + 1) * original - amount * blurred`, clamped to
/// `[0, 255]`. With a positive `threshold`, channels whose
/// `|original - blurred|` is below it keep their original value.
pub fn unsharp_mask(image: &RgbImage, params: &UnsharpParams) -> RgbImage {
    // Blur at float precision so flat regions come back unchanged.
    let float: ImageBuffer<Rgb<f32>, Vec<f32>> =
        ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
            Rgb(image.get_pixel(x, y).0.map(f32::from))
        });
    let blurred = separable_filter_equal(&float, &gaussian_kernel_5(params.sigma));
    let amount = params.amount;

    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let original = image.get_pixel(x, y).0;
        let blur = blurred.get_pixel(x, y).0;
        let mut out = [0u8; 3];
        for c in 0..3 {
            let o = original[c] as f32;
            let b = blur[c];
            if params.threshold > 0.0 && (o - b).abs() < params.threshold {
                out[c] = original[c];
                continue;
            }
            let sharpened = (amount + 1.0) * o - amount * b;
            out[c] = if sharpened.is_nan() {
                original[c]
            } else {
                sharpened.clamp(0.0, 255.0).round() as u8
            };
        }
        Rgb(out)
    })
}

/// Normalized 5-tap Gaussian weights.
fn gaussian_kernel_5(sigma: f32) -> [f32; 5] {
    // 0.3 * ((5 - 1) * 0.5 - 1) + 0.8, the sigma implied by a 5-tap support.
    let sigma = if sigma.is_finite() && sigma > 0.0 { sigma } else { 1.1 };
    let mut kernel = [0f32; 5];
    for (i, k) in kernel.iter_mut().enumerate() {
        let d = i as f32 - 2.0;
        *k = (-(d * d) / (2.0 * sigma * sigma)).exp();
    }
    let sum: f32 = kernel.iter().sum();
    kernel.map(|k| k / sum)
}

/// Resolution and sharpness summary used to judge whether upscaling is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QualityReport {
    pub width: u32,
    pub height: u32,
    /// Variance of the Laplacian of the grayscale image
    pub sharpness: f64,
    pub needs_upscaling: bool,
    pub recommended_scale: u32,
    pub decision: ScaleDecision,
}

impl QualityReport {
    pub fn measure(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let longer = width.max(height);
        let gray = imageops::grayscale(image);
        let laplacian = filter3x3::<_, i16, i16>(&gray, &[0, 1, 0, 1, -4, 1, 0, 1, 0]);

        let n = (width as f64 * height as f64).max(1.0);
        let mean = laplacian.pixels().map(|p| p.0[0] as f64).sum::<f64>() / n;
        let sharpness = laplacian
            .pixels()
            .map(|p| (p.0[0] as f64 - mean).powi(2))
            .sum::<f64>()
            / n;

        Self {
            width,
            height,
            sharpness,
            needs_upscaling: longer < ScaleDecision::MEDIUM_BELOW,
            recommended_scale: if longer < ScaleDecision::SMALL_BELOW { 4 } else { 2 },
            decision: ScaleDecision::for_dimensions(width, height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unavailable;

    impl SuperResolver for Unavailable {
        fn name(&self) -> &str {
            "none"
        }

        fn super_resolve(&self, _: &RgbImage, _: u32) -> Result<RgbImage, SuperResolutionError> {
            Err(SuperResolutionError::Unavailable("not installed".into()))
        }
    }

    struct Nearest;

    impl SuperResolver for Nearest {
        fn name(&self) -> &str {
            "nearest"
        }

        fn super_resolve(&self, image: &RgbImage, scale: u32) -> Result<RgbImage, SuperResolutionError> {
            Ok(imageops::resize(
                image,
                image.width() * scale,
                image.height() * scale,
                FilterType::Nearest,
            ))
        }
    }

    struct WrongSize;

    impl SuperResolver for WrongSize {
        fn name(&self) -> &str {
            "wrong-size"
        }

        fn super_resolve(&self, image: &RgbImage, _: u32) -> Result<RgbImage, SuperResolutionError> {
            Ok(image.clone())
        }
    }

    fn checkerboard(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgb([10, 10, 10])
            } else {
                Rgb([245, 245, 245])
            }
        })
    }

    #[test]
    fn test_skip_returns_identical_image() {
        let image = RgbImage::from_pixel(2100, 10, Rgb([1, 2, 3]));
        let result = ResolutionNormalizer::default().normalize(&image, &Unavailable);
        assert_eq!(result.path, UpscalePath::Skipped);
        assert!(result.soft_failure.is_none());
        assert_eq!(result.image, image);
    }

    #[test]
    fn test_unavailable_oracle_falls_back() {
        let image = checkerboard(60, 40);
        let result = ResolutionNormalizer::default().normalize(&image, &Unavailable);
        assert_eq!(result.path, UpscalePath::Fallback);
        assert_eq!(result.image.dimensions(), (240, 160));
        assert!(matches!(
            result.soft_failure,
            Some(SoftFailure::SuperResolutionUnavailable { .. })
        ));
    }

    #[test]
    fn test_oracle_success_is_used() {
        let image = checkerboard(900, 100);
        let result = ResolutionNormalizer::default().normalize(&image, &Nearest);
        assert_eq!(result.path, UpscalePath::SuperResolution("nearest".into()));
        assert_eq!(result.image.dimensions(), (1800, 200));
        assert!(result.soft_failure.is_none());
    }

    #[test]
    fn test_wrong_size_oracle_output_is_rejected() {
        let image = checkerboard(30, 30);
        let result = ResolutionNormalizer::default().normalize(&image, &WrongSize);
        assert_eq!(result.path, UpscalePath::Fallback);
        assert_eq!(result.image.dimensions(), (120, 120));
        assert_eq!(
            result.soft_failure,
            Some(SoftFailure::SuperResolutionInvalidOutput {
                expected: (120, 120),
                actual: (30, 30),
            })
        );
    }

    #[test]
    fn test_unsharp_mask_stays_in_range_for_extreme_amounts() {
        let image = checkerboard(32, 32);
        for amount in [1.5, 50.0, 1e6] {
            let params = UnsharpParams { amount, ..Default::default() };
            let sharpened = unsharp_mask(&image, &params);
            assert_eq!(sharpened.dimensions(), image.dimensions());
            // Strong sharpening pushes edges to the extremes but never wraps.
            let dark_edge = sharpened.get_pixel(3, 0).0[0];
            let light_edge = sharpened.get_pixel(4, 0).0[0];
            assert!(dark_edge <= 10, "dark edge {dark_edge}");
            assert!(light_edge >= 245, "light edge {light_edge}");
        }
    }

    #[test]
    fn test_unsharp_mask_leaves_flat_regions_alone() {
        let image = RgbImage::from_pixel(16, 16, Rgb([120, 60, 200]));
        let sharpened = unsharp_mask(&image, &UnsharpParams::default());
        assert_eq!(sharpened, image);
    }

    #[test]
    fn test_unsharp_threshold_suppresses_small_differences() {
        let mut image = RgbImage::from_pixel(16, 16, Rgb([100, 100, 100]));
        image.put_pixel(8, 8, Rgb([104, 104, 104]));

        let plain = unsharp_mask(&image, &UnsharpParams::default());
        assert!(plain.get_pixel(8, 8).0[0] > 104);

        let gated = unsharp_mask(
            &image,
            &UnsharpParams { threshold: 10.0, ..Default::default() },
        );
        assert_eq!(gated, image);
    }

    #[test]
    fn test_gaussian_kernel_is_normalized() {
        let kernel = gaussian_kernel_5(1.0);
        assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert_eq!(kernel[0], kernel[4]);
        assert!(kernel[2] > kernel[1] && kernel[1] > kernel[0]);
        assert_eq!(gaussian_kernel_5(f32::NAN), gaussian_kernel_5(1.1));
    }

    #[test]
    fn test_unsharp_mask_near_border() {
        // A dark column on the left edge stays dark and its neighbour brightens.
        let image = RgbImage::from_fn(12, 12, |x, _| {
            if x == 0 { Rgb([40, 40, 40]) } else { Rgb([160, 160, 160]) }
        });
        let sharpened = unsharp_mask(&image, &UnsharpParams::default());
        assert!(sharpened.get_pixel(0, 6).0[0] <= 40);
        assert!(sharpened.get_pixel(1, 6).0[0] > 160);
        assert_eq!(sharpened.get_pixel(11, 6).0[0], 160);
    }

    #[test]
    fn test_quality_report() {
        let flat = QualityReport::measure(&RgbImage::from_pixel(700, 300, Rgb([50, 50, 50])));
        assert_eq!(flat.sharpness, 0.0);
        assert!(flat.needs_upscaling);
        assert_eq!(flat.recommended_scale, 4);

        let busy = QualityReport::measure(&checkerboard(1600, 100));
        assert!(busy.sharpness > 0.0);
        assert!(!busy.needs_upscaling);
        assert_eq!(busy.recommended_scale, 2);
    }
}
