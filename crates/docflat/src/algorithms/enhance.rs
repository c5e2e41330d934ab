use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::filter3x3;
use tracing::{debug, instrument};

use crate::config::EnhancementConfig;

const SHARPEN: [i32; 9] = [-1, -1, -1, -1, 9, -1, -1, -1, -1];

/// Local contrast equalization of the luminance followed by a 3x3 sharpen.
///
/// Only brightness is equalized: every channel of a pixel is shifted by the
/// same amount, so chroma differences survive unless a channel saturates.
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn enhance_document(image: &RgbImage, config: &EnhancementConfig) -> RgbImage {
    let luma = luminance(image);
    let equalized = clahe(&luma, config.clip_limit, config.tile_grid);

    let shifted = RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let delta = equalized.get_pixel(x, y).0[0] as i16 - luma.get_pixel(x, y).0[0] as i16;
        Rgb(image
            .get_pixel(x, y)
            .0
            .map(|c| (c as i16 + delta).clamp(0, 255) as u8))
    });

    filter3x3::<_, i32, u8>(&shifted, &SHARPEN)
}

/// Rec. 709 luma, rounded.
fn luminance(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0.map(f32::from);
        Luma([(0.2126 * r + 0.7152 * g + 0.0722 * b).round().clamp(0.0, 255.0) as u8])
    })
}

/// Contrast-limited adaptive histogram equalization over a `grid` x `grid`
/// tiling. Each tile's histogram is clipped at `clip_limit` times the mean
/// bin height, the excess spread over all bins, and the per-tile lookup
/// tables blended bilinearly between tile centres.
pub fn clahe(gray: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }
    let grid = grid.max(1);
    let tile_w = width.div_ceil(grid.min(width));
    let tile_h = height.div_ceil(grid.min(height));
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);
    debug!(tiles_x, tiles_y, tile_w, tile_h, clip_limit, "Equalizing tiles");

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            // The last row and column of tiles are shifted inwards so every
            // tile has the same area.
            let x0 = (tx * tile_w).min(width - tile_w);
            let y0 = (ty * tile_h).min(height - tile_h);
            let mut hist = [0u32; 256];
            for y in y0..y0 + tile_h {
                for x in x0..x0 + tile_w {
                    hist[gray.get_pixel(x, y).0[0] as usize] += 1;
                }
            }
            luts.push(tile_lut(hist, tile_w * tile_h, clip_limit));
        }
    }

    let lut = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];
    GrayImage::from_fn(width, height, |x, y| {
        let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let (tx1, ax) = neighbour_tiles(fx, tiles_x);
        let (ty1, ay) = neighbour_tiles(fy, tiles_y);
        let tx2 = (tx1 + 1).min(tiles_x - 1);
        let ty2 = (ty1 + 1).min(tiles_y - 1);

        let v = gray.get_pixel(x, y).0[0] as usize;
        let top = lut(tx1, ty1)[v] * (1.0 - ax) + lut(tx2, ty1)[v] * ax;
        let bottom = lut(tx1, ty2)[v] * (1.0 - ax) + lut(tx2, ty2)[v] * ax;
        Luma([(top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8])
    })
}

/// Lower tile index and blend weight for a fractional tile coordinate.
fn neighbour_tiles(f: f32, tiles: u32) -> (u32, f32) {
    if f <= 0.0 {
        return (0, 0.0);
    }
    let lower = f.floor() as u32;
    if lower >= tiles - 1 {
        return (tiles - 1, 0.0);
    }
    (lower, f - f.floor())
}

fn tile_lut(mut hist: [u32; 256], area: u32, clip_limit: f32) -> [f32; 256] {
    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
        let mut clipped = 0;
        for bin in hist.iter_mut() {
            if *bin > limit {
                clipped += *bin - limit;
                *bin = limit;
            }
        }

        let batch = clipped / 256;
        let mut residual = clipped % 256;
        for bin in hist.iter_mut() {
            *bin += batch;
        }
        if residual > 0 {
            let step = (256 / residual).max(1) as usize;
            for bin in hist.iter_mut().step_by(step) {
                if residual == 0 {
                    break;
                }
                *bin += 1;
                residual -= 1;
            }
        }
    }

    let scale = 255.0 / area.max(1) as f32;
    let mut lut = [0f32; 256];
    let mut sum = 0u32;
    for (value, count) in hist.iter().enumerate() {
        sum += count;
        lut[value] = (sum as f32 * scale).min(255.0);
    }
    lut
}
