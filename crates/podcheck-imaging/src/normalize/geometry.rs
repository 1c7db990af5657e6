// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometric corrections: skew detection via Hough lines and perspective
// rectification of a photographed page.
//
// Both return `None` when nothing needs to change (or nothing reliable was
// found), so the caller can record the stage as skipped.

use image::{GrayImage, Rgb, RgbImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};
use imageproc::point::Point;
use tracing::{debug, info, instrument, warn};

use crate::raster::ImageProcessor;
use crate::raster::contour::external_shapes;
use crate::raster::morphology::{StructuringElement, dilate};

/// Skew below this many degrees is left alone.
pub const MIN_SKEW_DEGREES: f32 = 1.0;

/// Lines deviating more than this from horizontal are not text baselines.
const MAX_LINE_DEVIATION: f32 = 45.0;

/// Minimum share of the page a detected outline must cover.
const MIN_PAGE_AREA_FRACTION: f64 = 0.10;

/// Estimate page skew in degrees (positive = content rotated clockwise).
///
/// A `PolarLine` describes `x cos(theta) + y sin(theta) = r`, so a horizontal
/// baseline has `theta = 90` and its deviation from horizontal is
/// `theta - 90`. The median over near-horizontal lines is robust to the odd
/// vertical table rule.
#[instrument(skip(gray), fields(width = gray.width(), height = gray.height()))]
pub fn detect_skew(gray: &GrayImage) -> Option<f32> {
    let edges = canny(gray, 50.0, 150.0);
    let min_side = gray.width().min(gray.height()) as f32;
    let vote_threshold = (min_side * 0.3).clamp(40.0, 200.0) as u32;
    let lines = detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold,
            suppression_radius: 8,
        },
    );
    let mut deviations: Vec<f32> = lines
        .iter()
        .map(|line: &PolarLine| line.angle_in_degrees as f32 - 90.0)
        .filter(|dev| dev.abs() < MAX_LINE_DEVIATION)
        .collect();
    debug!(lines = lines.len(), horizontal = deviations.len(), vote_threshold, "Hough lines detected");
    if deviations.is_empty() {
        return None;
    }
    deviations.sort_by(f32::total_cmp);
    let mid = deviations.len() / 2;
    let median = if deviations.len() % 2 == 0 {
        (deviations[mid - 1] + deviations[mid]) / 2.0
    } else {
        deviations[mid]
    };
    Some(median)
}

/// Rotate the page upright when its skew exceeds [`MIN_SKEW_DEGREES`].
pub fn correct_orientation(image: &RgbImage) -> Option<RgbImage> {
    let gray = image::imageops::grayscale(image);
    let skew = detect_skew(&gray)?;
    if skew.abs() <= MIN_SKEW_DEGREES {
        debug!(skew, "Skew within tolerance");
        return None;
    }
    info!(skew, "Deskewing page");
    Some(ImageProcessor::from_rgb(image.clone()).rotate(-skew).into_rgb8())
}

/// Find the page outline and warp it to a fronto-parallel rectangle.
///
/// The outline is the largest external edge contour that simplifies to four
/// vertices and covers at least a tenth of the image. Output size comes from
/// the longer of each pair of opposite edges.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn correct_perspective(image: &RgbImage) -> Option<RgbImage> {
    let (w, h) = image.dimensions();
    let gray = image::imageops::grayscale(image);
    let blurred = gaussian_blur_f32(&gray, 2.0);
    let edges = canny(&blurred, 50.0, 150.0);
    let closed = dilate(&edges, &StructuringElement::rect(3, 3));

    let min_area = w as f64 * h as f64 * MIN_PAGE_AREA_FRACTION;
    let quad = external_shapes(&closed)
        .into_iter()
        .filter(|shape| shape.area >= min_area)
        .filter_map(|shape| {
            let polygon = shape.approx_polygon(0.02);
            (polygon.len() == 4).then_some((shape.area, polygon))
        })
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, polygon)| polygon);

    let Some(quad) = quad else {
        debug!("No page outline found");
        return None;
    };
    let corners = order_corners(&quad);
    debug!(
        top_left = ?corners[0],
        top_right = ?corners[1],
        bottom_right = ?corners[2],
        bottom_left = ?corners[3],
        "Page corners"
    );

    let quad_area = shoelace_area(&corners);
    if (quad_area as f64) < min_area {
        warn!(quad_area, min_area, "Detected quadrilateral too small; leaving page unchanged");
        return None;
    }

    let dist = |a: (f32, f32), b: (f32, f32)| ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
    let out_w = dist(corners[0], corners[1]).max(dist(corners[3], corners[2])).round() as u32;
    let out_h = dist(corners[0], corners[3]).max(dist(corners[1], corners[2])).round() as u32;
    if out_w < 2 || out_h < 2 {
        return None;
    }

    let dest = [
        (0.0, 0.0),
        (out_w as f32 - 1.0, 0.0),
        (out_w as f32 - 1.0, out_h as f32 - 1.0),
        (0.0, out_h as f32 - 1.0),
    ];
    let Some(projection) = Projection::from_control_points(corners, dest) else {
        warn!("Failed to compute projective transform; leaving page unchanged");
        return None;
    };

    let mut output = RgbImage::new(out_w, out_h);
    warp_into(image, &projection, Interpolation::Bilinear, Rgb([255u8, 255, 255]), &mut output);
    info!(out_w, out_h, "Perspective correction applied");
    Some(output)
}

/// Order four points as top-left, top-right, bottom-right, bottom-left.
///
/// Top-left has the smallest `x + y`, bottom-right the largest; top-right has
/// the largest `x - y`, bottom-left the smallest.
pub fn order_corners(points: &[Point<i32>]) -> [(f32, f32); 4] {
    let by = |key: fn(&Point<i32>) -> i32, max: bool| -> (f32, f32) {
        let pick = if max {
            points.iter().max_by_key(|p| key(p))
        } else {
            points.iter().min_by_key(|p| key(p))
        };
        pick.map(|p| (p.x as f32, p.y as f32)).unwrap_or((0.0, 0.0))
    };
    [
        by(|p| p.x + p.y, false),
        by(|p| p.x - p.y, true),
        by(|p| p.x + p.y, true),
        by(|p| p.x - p.y, false),
    ]
}

/// Shoelace area of an ordered quadrilateral.
fn shoelace_area(corners: &[(f32, f32); 4]) -> f32 {
    let n = corners.len();
    let mut area = 0.0f32;
    for i in 0..n {
        let j = (i + 1) % n;
        area += corners[i].0 * corners[j].1;
        area -= corners[j].0 * corners[i].1;
    }
    area.abs() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// White page with dark horizontal rules tilted by `degrees`.
    fn ruled_page(degrees: f32) -> GrayImage {
        let slope = degrees.to_radians().tan();
        GrayImage::from_fn(400, 300, |x, y| {
            let baseline = y as f32 - x as f32 * slope;
            let on_rule = (baseline.rem_euclid(40.0)) < 3.0 && x > 20 && x < 380;
            Luma([if on_rule { 20 } else { 235 }])
        })
    }

    #[test]
    fn level_rules_have_no_skew() {
        let skew = detect_skew(&ruled_page(0.0)).unwrap();
        assert!(skew.abs() <= 1.0, "skew {skew}");
    }

    #[test]
    fn tilted_rules_are_measured() {
        let skew = detect_skew(&ruled_page(5.0)).unwrap();
        assert!((skew - 5.0).abs() <= 1.5, "skew {skew}");
    }

    #[test]
    fn blank_page_has_no_skew_estimate() {
        let blank = GrayImage::from_pixel(200, 200, Luma([230]));
        assert!(detect_skew(&blank).is_none());
    }

    #[test]
    fn corners_are_ordered_clockwise_from_top_left() {
        let pts = [
            Point::new(90, 10),
            Point::new(10, 80),
            Point::new(12, 8),
            Point::new(95, 85),
        ];
        let ordered = order_corners(&pts);
        assert_eq!(ordered, [(12.0, 8.0), (90.0, 10.0), (95.0, 85.0), (10.0, 80.0)]);
    }

    #[test]
    fn shoelace_of_rectangle() {
        let rect = [(0.0, 0.0), (10.0, 0.0), (10.0, 5.0), (0.0, 5.0)];
        assert!((shoelace_area(&rect) - 50.0).abs() < 1e-4);
    }

    #[test]
    fn perspective_blank_image_is_left_alone() {
        let img = RgbImage::from_pixel(120, 160, Rgb([200, 200, 200]));
        assert!(correct_perspective(&img).is_none());
    }

    #[test]
    fn perspective_finds_bright_sheet_on_dark_table() {
        // A light quadrilateral on a dark background.
        let img = RgbImage::from_fn(200, 200, |x, y| {
            let inside = x > 30 && x < 170 && y > 20 && y < 180 && (x as i32 - 30) > (y as i32 - 20) / 10;
            if inside { Rgb([240, 240, 240]) } else { Rgb([30, 30, 30]) }
        });
        let out = correct_perspective(&img).expect("sheet outline should be found");
        assert!(out.width() > 100 && out.height() > 100);
    }
}
