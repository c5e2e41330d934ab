use image::{GrayImage, Luma, RgbImage, imageops};
use tracing::debug;

use crate::algorithms::contours::external_contours;

/// Trim white space around the content, keeping `padding` pixels of margin.
///
/// Pixels at or below `white_level` (in grayscale) are content. An image with
/// no content is returned unchanged.
pub fn crop_to_content(image: &RgbImage, white_level: u8, padding: u32) -> RgbImage {
    let gray = imageops::grayscale(image);
    let content = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y).0[0] > white_level {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    });

    let bounds = external_contours(&content)
        .iter()
        .filter_map(|c| c.bounds())
        .reduce(|a, b| (a.0.min(b.0), a.1.min(b.1), a.2.max(b.2), a.3.max(b.3)));

    let Some((min_x, min_y, max_x, max_y)) = bounds else {
        return image.clone();
    };

    let (width, height) = image.dimensions();
    let x = (min_x.max(0) as u32).saturating_sub(padding);
    let y = (min_y.max(0) as u32).saturating_sub(padding);
    let right = (max_x.max(0) as u32 + 1 + padding).min(width);
    let bottom = (max_y.max(0) as u32 + 1 + padding).min(height);
    debug!(x, y, w = right - x, h = bottom - y, "Cropping to content");

    imageops::crop_imm(image, x, y, right - x, bottom - y).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    #[test]
    fn test_crop_with_padding() {
        let mut image = RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]));
        draw_filled_rect_mut(&mut image, Rect::at(50, 30).of_size(40, 20), Rgb([0, 0, 0]));
        draw_filled_rect_mut(&mut image, Rect::at(120, 40).of_size(10, 10), Rgb([0, 0, 0]));

        let cropped = crop_to_content(&image, 250, 10);
        // Content spans x 50..=129, y 30..=49.
        assert_eq!(cropped.dimensions(), (100, 40));
        assert_eq!(*cropped.get_pixel(10, 10), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_crop_clamps_to_image() {
        let mut image = RgbImage::from_pixel(50, 50, Rgb([255, 255, 255]));
        draw_filled_rect_mut(&mut image, Rect::at(0, 0).of_size(45, 48), Rgb([20, 20, 20]));
        let cropped = crop_to_content(&image, 250, 10);
        assert_eq!(cropped.dimensions(), (50, 50));
    }

    #[test]
    fn test_blank_image_unchanged() {
        let image = RgbImage::from_pixel(30, 30, Rgb([255, 255, 255]));
        assert_eq!(crop_to_content(&image, 250, 10), image);
    }
}
