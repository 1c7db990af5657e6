// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contour extraction and the shape measurements the detectors filter on.

use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use podcheck_core::BoundingBox;

/// An outer contour with its basic measurements precomputed.
#[derive(Debug, Clone)]
pub struct Shape {
    pub points: Vec<Point<i32>>,
    pub bbox: BoundingBox,
    /// Polygon area enclosed by the boundary pixel centres.
    pub area: f64,
    /// Closed boundary length.
    pub perimeter: f64,
}

impl Shape {
    fn from_points(points: Vec<Point<i32>>) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let bbox = BoundingBox::new(
            min_x.max(0) as u32,
            min_y.max(0) as u32,
            (max_x - min_x + 1) as u32,
            (max_y - min_y + 1) as u32,
        );
        let area = polygon_area(&points);
        let perimeter = arc_length(&points, true);
        Some(Self {
            points,
            bbox,
            area,
            perimeter,
        })
    }

    /// `4 * pi * area / perimeter^2`: 1 for a disc, about 0.785 for a square.
    pub fn circularity(&self) -> f64 {
        if self.perimeter <= 0.0 {
            return 0.0;
        }
        4.0 * std::f64::consts::PI * self.area / (self.perimeter * self.perimeter)
    }

    /// Contour area over bounding-box area.
    pub fn extent(&self) -> f64 {
        let box_area = self.bbox.area() as f64;
        if box_area == 0.0 {
            0.0
        } else {
            (self.area / box_area).min(1.0)
        }
    }

    /// Centroid from first-order polygon moments. `None` for degenerate outlines.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        let n = self.points.len();
        let mut twice_area = 0.0f64;
        let mut cx = 0.0f64;
        let mut cy = 0.0f64;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            let cross = a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
            twice_area += cross;
            cx += (a.x + b.x) as f64 * cross;
            cy += (a.y + b.y) as f64 * cross;
        }
        if twice_area.abs() < f64::EPSILON {
            return None;
        }
        Some((cx / (3.0 * twice_area), cy / (3.0 * twice_area)))
    }

    /// Standard deviation of boundary-point distances to the centroid.
    pub fn radial_std_dev(&self) -> Option<f64> {
        let (cx, cy) = self.centroid()?;
        let distances: Vec<f64> = self
            .points
            .iter()
            .map(|p| ((p.x as f64 - cx).powi(2) + (p.y as f64 - cy).powi(2)).sqrt())
            .collect();
        let mean = distances.iter().sum::<f64>() / distances.len() as f64;
        let var = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / distances.len() as f64;
        Some(var.sqrt())
    }

    /// Douglas–Peucker simplification with tolerance `fraction * perimeter`.
    ///
    /// The closed outline is cut at the point farthest from its start and the
    /// two open halves are simplified separately, so both anchors survive.
    pub fn approx_polygon(&self, fraction: f64) -> Vec<Point<i32>> {
        let epsilon = fraction * self.perimeter;
        if self.points.len() < 3 || epsilon <= 0.0 {
            return self.points.clone();
        }
        let start = self.points[0];
        let split = self
            .points
            .iter()
            .enumerate()
            .max_by_key(|(_, p)| (p.x - start.x).pow(2) + (p.y - start.y).pow(2))
            .map(|(i, _)| i)
            .unwrap_or(0);
        if split == 0 {
            return vec![start];
        }

        let first_half = &self.points[..=split];
        let mut second_half = self.points[split..].to_vec();
        second_half.push(start);

        let mut polygon = approximate_polygon_dp(first_half, epsilon, false);
        let tail = approximate_polygon_dp(&second_half, epsilon, false);
        // Drop the shared split point and the closing copy of `start`.
        polygon.extend(tail.iter().skip(1).take(tail.len().saturating_sub(2)));
        polygon
    }
}

/// Outer borders of top-level connected components of a non-zero mask.
///
/// Borders of components nested inside holes are skipped, matching an
/// "external only" retrieval mode.
pub fn external_shapes(mask: &GrayImage) -> Vec<Shape> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| Shape::from_points(c.points))
        .collect()
}

/// Absolute shoelace area of a closed polygon.
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0f64;
    for i in 0..n {
        let j = (i + 1) % n;
        acc += points[i].x as f64 * points[j].y as f64;
        acc -= points[j].x as f64 * points[i].y as f64;
    }
    acc.abs() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn filled_rect(w: u32, h: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            Luma([if x >= x0 && x < x1 && y >= y0 && y < y1 { 255 } else { 0 }])
        })
    }

    fn filled_disc(size: u32, radius: f64) -> GrayImage {
        let c = size as f64 / 2.0;
        GrayImage::from_fn(size, size, |x, y| {
            let d = ((x as f64 - c).powi(2) + (y as f64 - c).powi(2)).sqrt();
            Luma([if d <= radius { 255 } else { 0 }])
        })
    }

    #[test]
    fn square_measurements() {
        let shapes = external_shapes(&filled_rect(50, 50, 10, 10, 30, 30));
        assert_eq!(shapes.len(), 1);
        let s = &shapes[0];
        assert_eq!(s.bbox, BoundingBox::new(10, 10, 20, 20));
        assert!((s.area - 361.0).abs() < 1.0, "area {}", s.area);
        assert!((s.perimeter - 76.0).abs() < 1.0, "perimeter {}", s.perimeter);
        assert!((s.circularity() - 0.785).abs() < 0.05);
        let (cx, cy) = s.centroid().unwrap();
        assert!((cx - 19.5).abs() < 0.5 && (cy - 19.5).abs() < 0.5);
        assert_eq!(s.approx_polygon(0.02).len(), 4);
    }

    #[test]
    fn disc_is_nearly_circular() {
        let shapes = external_shapes(&filled_disc(80, 25.0));
        assert_eq!(shapes.len(), 1);
        let circ = shapes[0].circularity();
        assert!(circ > 0.8, "circularity {circ}");
        assert!(shapes[0].radial_std_dev().unwrap() < 1.5);
    }

    #[test]
    fn ring_reports_only_the_outer_border() {
        let mut ring = filled_rect(60, 60, 5, 5, 55, 55);
        for y in 15..45 {
            for x in 15..45 {
                ring.put_pixel(x, y, Luma([0]));
            }
        }
        // A blob inside the hole is nested, so it is not external.
        for y in 25..35 {
            for x in 25..35 {
                ring.put_pixel(x, y, Luma([255]));
            }
        }
        let shapes = external_shapes(&ring);
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].bbox.width, 50);
    }

    #[test]
    fn thin_line_has_no_area_or_centroid() {
        let shapes = external_shapes(&filled_rect(30, 10, 2, 5, 28, 6));
        assert_eq!(shapes.len(), 1);
        assert!(shapes[0].area < 1.0);
        assert!(shapes[0].centroid().is_none());
    }

    #[test]
    fn empty_mask_has_no_shapes() {
        assert!(external_shapes(&GrayImage::new(10, 10)).is_empty());
    }
}
