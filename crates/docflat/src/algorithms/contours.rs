use std::cmp::Ordering;

use geo::{Area, BoundingRect, Centroid};
use geo_types::{Coord, LineString, MultiPoint, Polygon};
use image::{GrayImage, Luma, imageops};
use imageproc::contours::{BorderType, find_contours};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;

/// A closed outer boundary, one entry per boundary pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<[i32; 2]>,
}

impl Contour {
    pub fn to_geo_polygon(&self) -> Polygon<f64> {
        let coords: Vec<Coord<f64>> = self
            .points
            .iter()
            .map(|&[x, y]| Coord { x: x as f64, y: y as f64 })
            .collect();
        Polygon::new(LineString::new(coords), vec![])
    }

    pub fn to_multi_point(&self) -> MultiPoint<f64> {
        self.points
            .iter()
            .map(|&[x, y]| geo_types::Point::new(x as f64, y as f64))
            .collect::<Vec<_>>()
            .into()
    }

    /// Enclosed area of the boundary polygon through the pixel centres.
    pub fn area(&self) -> f64 {
        self.to_geo_polygon().unsigned_area()
    }

    /// Polygon centroid; degenerate boundaries fall back to the mean point.
    pub fn centroid(&self) -> [f64; 2] {
        if let Some(c) = self.to_geo_polygon().centroid() {
            if c.x().is_finite() && c.y().is_finite() {
                return [c.x(), c.y()];
            }
        }
        let n = self.points.len().max(1) as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &[x, y]| (sx + x as f64, sy + y as f64));
        [sx / n, sy / n]
    }

    /// Axis-aligned bounds as `(min_x, min_y, max_x, max_y)`.
    pub fn bounds(&self) -> Option<(i32, i32, i32, i32)> {
        let rect = self.to_multi_point().bounding_rect()?;
        Some((
            rect.min().x as i32,
            rect.min().y as i32,
            rect.max().x as i32,
            rect.max().y as i32,
        ))
    }
}

/// Outermost boundaries of the non-zero regions of `binary`.
///
/// Hole borders and regions nested inside holes are dropped. The border
/// follower needs background on every side of a region, so the mask is traced
/// on a canvas with a one pixel empty frame and the points are shifted back.
pub fn external_contours(binary: &GrayImage) -> Vec<Contour> {
    let mut framed = GrayImage::new(binary.width() + 2, binary.height() + 2);
    imageops::replace(&mut framed, binary, 1, 1);

    find_contours::<i32>(&framed)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter(|c| !c.points.is_empty())
        .map(|c| Contour {
            points: c.points.iter().map(|p| [p.x - 1, p.y - 1]).collect(),
        })
        .collect()
}

/// Pick the contour with the largest enclosed area.
///
/// Equal areas are resolved by the smaller centroid x, then the smaller
/// centroid y, then enumeration order.
pub fn largest_contour(contours: &[Contour]) -> Option<&Contour> {
    let mut best: Option<(&Contour, f64, [f64; 2])> = None;
    for contour in contours {
        let area = contour.area();
        let centroid = contour.centroid();
        let better = match &best {
            None => true,
            Some((_, best_area, best_centroid)) => match area.partial_cmp(best_area) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => {
                    (centroid[0], centroid[1]) < (best_centroid[0], best_centroid[1])
                }
                _ => false,
            },
        };
        if better {
            best = Some((contour, area, centroid));
        }
    }
    best.map(|(contour, _, _)| contour)
}

/// Rasterize a single contour as a filled region (boundary included) on an
/// empty `width` x `height` mask.
pub fn fill_contour(width: u32, height: u32, contour: &Contour) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let white = Luma([255u8]);

    let mut polygon: Vec<Point<i32>> = Vec::with_capacity(contour.points.len());
    for &[x, y] in &contour.points {
        let p = Point::new(x, y);
        if polygon.last() != Some(&p) {
            polygon.push(p);
        }
    }
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }

    if polygon.len() >= 3 {
        draw_polygon_mut(&mut mask, &polygon, white);
    }

    // Thin parts of a boundary enclose no area, trace them explicitly.
    for pair in contour.points.windows(2) {
        draw_line_segment_mut(
            &mut mask,
            (pair[0][0] as f32, pair[0][1] as f32),
            (pair[1][0] as f32, pair[1][1] as f32),
            white,
        );
    }
    for &[x, y] in &contour.points {
        if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
            mask.put_pixel(x as u32, y as u32, white);
        }
    }

    mask
}
