use geo::{BoundingRect, MinimumRotatedRect};

use crate::algorithms::contours::Contour;
use crate::types::Quadrilateral;

/// Label four unordered corners.
///
/// Top-left has the smallest `x + y`, bottom-right the largest; top-right has
/// the smallest `y - x`, bottom-left the largest. Ties go to the first
/// occurrence in `points`. Degenerate input may assign one point two labels.
pub fn order_points(points: [[f32; 2]; 4]) -> Quadrilateral {
    let sum = points.map(|[x, y]| x + y);
    let diff = points.map(|[x, y]| y - x);

    Quadrilateral {
        top_left: points[arg_min(&sum)],
        top_right: points[arg_min(&diff)],
        bottom_right: points[arg_max(&sum)],
        bottom_left: points[arg_max(&diff)],
    }
}

fn arg_min(values: &[f32; 4]) -> usize {
    let mut best = 0;
    for i in 1..values.len() {
        if values[i] < values[best] {
            best = i;
        }
    }
    best
}

fn arg_max(values: &[f32; 4]) -> usize {
    let mut best = 0;
    for i in 1..values.len() {
        if values[i] > values[best] {
            best = i;
        }
    }
    best
}

/// Corners of the minimum-area (possibly rotated) rectangle enclosing `contour`,
/// rounded to whole pixels. Always four points, even for slivers.
pub fn min_area_corners(contour: &Contour) -> Option<[[f32; 2]; 4]> {
    if contour.points.is_empty() {
        return None;
    }

    let rotated = contour
        .to_geo_polygon()
        .minimum_rotated_rect()
        .and_then(|rect| {
            let coords: Vec<_> = rect.exterior().coords().take(4).copied().collect();
            if coords.len() == 4 && coords.iter().all(|c| c.x.is_finite() && c.y.is_finite()) {
                Some([
                    [coords[0].x, coords[0].y],
                    [coords[1].x, coords[1].y],
                    [coords[2].x, coords[2].y],
                    [coords[3].x, coords[3].y],
                ])
            } else {
                None
            }
        });

    let corners = match rotated {
        Some(corners) => corners,
        None => {
            let rect = contour.to_multi_point().bounding_rect()?;
            let (min, max) = (rect.min(), rect.max());
            [[min.x, min.y], [max.x, min.y], [max.x, max.y], [min.x, max.y]]
        }
    };

    Some(corners.map(|[x, y]| [x.round() as f32, y.round() as f32]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_points_axis_aligned() {
        let quad = order_points([[10.0, 0.0], [0.0, 10.0], [0.0, 0.0], [10.0, 10.0]]);
        assert_eq!(quad.top_left, [0.0, 0.0]);
        assert_eq!(quad.top_right, [10.0, 0.0]);
        assert_eq!(quad.bottom_right, [10.0, 10.0]);
        assert_eq!(quad.bottom_left, [0.0, 10.0]);
    }

    #[test]
    fn test_order_points_is_permutation_invariant() {
        let pts = [[12.0, 3.0], [52.0, 18.0], [40.0, 60.0], [2.0, 44.0]];
        let expected = order_points(pts);
        let permutations = [
            [pts[3], pts[2], pts[1], pts[0]],
            [pts[1], pts[3], pts[0], pts[2]],
            [pts[2], pts[0], pts[3], pts[1]],
        ];
        for perm in permutations {
            assert_eq!(order_points(perm), expected);
        }
        assert_eq!(expected.top_left, [12.0, 3.0]);
        assert_eq!(expected.bottom_right, [40.0, 60.0]);
    }

    #[test]
    fn test_order_points_ties_take_first_occurrence() {
        // A diamond: (5,0) and (0,5) share the minimal sum.
        let quad = order_points([[5.0, 0.0], [0.0, 5.0], [5.0, 10.0], [10.0, 5.0]]);
        assert_eq!(quad.top_left, [5.0, 0.0]);

        let swapped = order_points([[0.0, 5.0], [5.0, 0.0], [5.0, 10.0], [10.0, 5.0]]);
        assert_eq!(swapped.top_left, [0.0, 5.0]);
    }

    #[test]
    fn test_order_points_coincident_corners() {
        let quad = order_points([[4.0, 4.0]; 4]);
        assert_eq!(quad.corners(), [[4.0, 4.0]; 4]);
    }

    #[test]
    fn test_min_area_corners_axis_aligned_rectangle() {
        let mut points = Vec::new();
        for x in 10..=30 {
            points.push([x, 5]);
        }
        for y in 6..=15 {
            points.push([30, y]);
        }
        for x in (10..30).rev() {
            points.push([x, 15]);
        }
        for y in (6..15).rev() {
            points.push([10, y]);
        }
        let corners = min_area_corners(&Contour { points }).expect("corners");
        let quad = order_points(corners);
        assert_eq!(quad.top_left, [10.0, 5.0]);
        assert_eq!(quad.top_right, [30.0, 5.0]);
        assert_eq!(quad.bottom_right, [30.0, 15.0]);
        assert_eq!(quad.bottom_left, [10.0, 15.0]);
    }

    #[test]
    fn test_min_area_corners_rotated_square() {
        let contour = Contour {
            points: vec![[0, 10], [30, 0], [40, 30], [10, 40]],
        };
        let corners = min_area_corners(&contour).expect("corners");
        let quad = order_points(corners);
        assert_eq!(quad.top_left, [0.0, 10.0]);
        assert_eq!(quad.top_right, [30.0, 0.0]);
        assert_eq!(quad.bottom_right, [40.0, 30.0]);
        assert_eq!(quad.bottom_left, [10.0, 40.0]);
        assert_eq!(quad.target_size(), (31, 31));
    }

    #[test]
    fn test_min_area_corners_degenerate_inputs() {
        let single = Contour { points: vec![[7, 9]] };
        assert_eq!(min_area_corners(&single), Some([[7.0, 9.0]; 4]));

        let line = Contour {
            points: vec![[0, 3], [1, 3], [2, 3], [3, 3], [2, 3], [1, 3]],
        };
        let corners = min_area_corners(&line).expect("corners");
        assert!(corners.iter().all(|c| c[1] == 3.0));

        assert!(min_area_corners(&Contour { points: vec![] }).is_none());
    }
}
