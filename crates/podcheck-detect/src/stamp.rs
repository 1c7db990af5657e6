// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rubber-stamp detection.
//
// Two passes over an Otsu ink mask: round stamps are found by circularity,
// box stamps by a four-to-six vertex outline. Every hit is read through the
// consensus engine, and stamps naming a blocklisted issuer (the shipper's
// own companies) are kept but marked invalid.

use image::{DynamicImage, GrayImage, RgbImage};
use podcheck_core::config::PodConfig;
use podcheck_core::{BoundingBox, Confidence, StampCandidate, StampShape};
use podcheck_imaging::raster::binarize::otsu_threshold;
use podcheck_imaging::raster::contour::external_shapes;
use podcheck_imaging::raster::morphology::close;
use podcheck_imaging::raster::{Polarity, Shape, StructuringElement};
use podcheck_imaging::zones::crop;
use podcheck_ocr::ConsensusEngine;
use tracing::{debug, info, instrument};

const POLYGON_TOLERANCE: f64 = 0.02;
const VERTEX_RANGE: (usize, usize) = (4, 6);
const RECT_ASPECT_RANGE: (f64, f64) = (0.5, 3.0);
/// Box hits overlapping a round hit this much are the same stamp.
const DUPLICATE_OVERLAP: f64 = 0.5;

pub struct StampDetector {
    min_area: f64,
    max_area: f64,
    circularity: f64,
    blocklist: Vec<String>,
}

impl StampDetector {
    pub fn new(config: &PodConfig) -> Self {
        Self {
            min_area: config.thresholds.stamp_min_area,
            max_area: config.thresholds.stamp_max_area,
            circularity: config.thresholds.stamp_circularity,
            blocklist: config.invalid_stamps.iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn detect(&self, image: &RgbImage, engine: &ConsensusEngine) -> Vec<StampCandidate> {
        if image.width() == 0 || image.height() == 0 {
            return Vec::new();
        }
        let ink = otsu_threshold(&image::imageops::grayscale(image), Polarity::InkMask);

        let mut stamps = Vec::new();
        for shape in self.circular(&ink) {
            stamps.push(self.read(image, engine, &shape, StampShape::Circular, None));
        }
        for (shape, vertices) in self.rectangular(&ink) {
            if stamps.iter().any(|s| overlap(s.bbox, shape.bbox) >= DUPLICATE_OVERLAP) {
                continue;
            }
            stamps.push(self.read(image, engine, &shape, StampShape::Rectangular, Some(vertices)));
        }

        info!(
            count = stamps.len(),
            valid = stamps.iter().filter(|s| s.is_valid).count(),
            "Stamps detected"
        );
        stamps
    }

    fn in_area_range(&self, shape: &Shape) -> bool {
        shape.area >= self.min_area && shape.area <= self.max_area
    }

    fn circular(&self, ink: &GrayImage) -> Vec<Shape> {
        let mask = close(ink, &StructuringElement::ellipse(5, 5));
        external_shapes(&mask)
            .into_iter()
            .filter(|s| self.in_area_range(s) && s.perimeter > 0.0 && s.circularity() >= self.circularity)
            .collect()
    }

    fn rectangular(&self, ink: &GrayImage) -> Vec<(Shape, usize)> {
        let mask = close(ink, &StructuringElement::rect(5, 5));
        external_shapes(&mask)
            .into_iter()
            .filter(|s| self.in_area_range(s))
            .filter_map(|s| {
                let vertices = s.approx_polygon(POLYGON_TOLERANCE).len();
                let aspect = s.bbox.aspect_ratio();
                let boxy = (VERTEX_RANGE.0..=VERTEX_RANGE.1).contains(&vertices)
                    && (RECT_ASPECT_RANGE.0..=RECT_ASPECT_RANGE.1).contains(&aspect);
                boxy.then_some((s, vertices))
            })
            .collect()
    }

    fn read(
        &self,
        image: &RgbImage,
        engine: &ConsensusEngine,
        shape: &Shape,
        kind: StampShape,
        vertices: Option<usize>,
    ) -> StampCandidate {
        let roi = crop(image, shape.bbox);
        let text = engine.recognize(&DynamicImage::ImageRgb8(roi)).text.trim().to_lowercase();
        let is_valid = self.is_allowed(&text);
        let circularity = shape.circularity();
        let confidence = match kind {
            StampShape::Circular => circularity,
            StampShape::Rectangular => shape.extent(),
        };
        debug!(?kind, bbox = ?shape.bbox, circularity, text = %text, is_valid, "Stamp candidate");
        StampCandidate {
            bbox: shape.bbox,
            confidence: Confidence::new(confidence),
            shape: kind,
            circularity,
            vertices,
            text,
            is_valid,
        }
    }

    /// False when `text` contains any blocklisted issuer name.
    pub fn is_allowed(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        !self.blocklist.iter().any(|blocked| text.contains(blocked.as_str()))
    }
}

/// Intersection over union of two boxes.
fn overlap(a: BoundingBox, b: BoundingBox) -> f64 {
    let x0 = a.x.max(b.x);
    let y0 = a.y.max(b.y);
    let x1 = (a.x + a.width).min(b.x + b.width);
    let y1 = (a.y + a.height).min(b.y + b.height);
    if x1 <= x0 || y1 <= y0 {
        return 0.0;
    }
    let inter = (x1 - x0) as f64 * (y1 - y0) as f64;
    let union = a.area() as f64 + b.area() as f64 - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}
