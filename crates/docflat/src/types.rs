use image::{GrayImage, Luma};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{DocflatError, Result};

/// Per-pixel foreground probability, row-major, as produced by a segmentation model.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMask {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl ProbabilityMask {
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(DocflatError::InvalidMask(format!(
                "mask dimensions must be non-zero, got {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(DocflatError::InvalidMask(format!(
                "expected {expected} values for a {width}x{height} mask, got {}",
                data.len()
            )));
        }
        Ok(Self { width, height, data })
    }

    /// Interpret an 8-bit gray raster as probabilities (`value / 255`).
    pub fn from_gray(image: &GrayImage) -> Result<Self> {
        let data = image.pixels().map(|p| p.0[0] as f32 / 255.0).collect();
        Self::new(image.width(), image.height(), data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.width + x) as usize]
    }

    /// Binary mask: 255 where the probability is strictly above `threshold`, 0 elsewhere.
    pub fn binarize(&self, threshold: f32) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            if self.get(x, y) > threshold {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        })
    }
}

/// Four corners labelled in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Quadrilateral {
    pub top_left: [f32; 2],
    pub top_right: [f32; 2],
    pub bottom_right: [f32; 2],
    pub bottom_left: [f32; 2],
}

impl Quadrilateral {
    /// Corners as `[top_left, top_right, bottom_right, bottom_left]`.
    pub fn corners(&self) -> [[f32; 2]; 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }

    /// Destination rectangle size: the longer of each pair of opposite sides,
    /// floored, never below one pixel.
    pub fn target_size(&self) -> (u32, u32) {
        let width = distance(self.bottom_left, self.bottom_right)
            .max(distance(self.top_left, self.top_right));
        let height = distance(self.top_right, self.bottom_right)
            .max(distance(self.top_left, self.bottom_left));
        (floor_to_pixels(width), floor_to_pixels(height))
    }
}

fn distance(a: [f32; 2], b: [f32; 2]) -> f64 {
    let dx = (a[0] - b[0]) as f64;
    let dy = (a[1] - b[1]) as f64;
    (dx * dx + dy * dy).sqrt()
}

fn floor_to_pixels(length: f64) -> u32 {
    if !length.is_finite() {
        return 1;
    }
    (length.floor() as u32).max(1)
}

/// How much the normalizer upscales an image. A pure function of its longer side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScaleDecision {
    pub scale_factor: u32,
    pub skip: bool,
}

impl ScaleDecision {
    pub const SKIP_ABOVE: u32 = 2000;
    pub const SMALL_BELOW: u32 = 800;
    pub const MEDIUM_BELOW: u32 = 1500;

    pub fn for_dimensions(width: u32, height: u32) -> Self {
        let longer = width.max(height);
        if longer > Self::SKIP_ABOVE {
            return Self { scale_factor: 1, skip: true };
        }
        let scale_factor = if longer < Self::SMALL_BELOW {
            4
        } else if longer < Self::MEDIUM_BELOW {
            2
        } else {
            // 1500..=2000 shares the medium factor.
            2
        };
        Self { scale_factor, skip: false }
    }
}
