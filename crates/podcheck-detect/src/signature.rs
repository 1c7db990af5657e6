// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Handwritten signature detection.
//
// Each zone is binarized against its local mean, small gaps are closed, and
// the outer contours are filtered to handwriting-sized, not-too-elongated
// blobs. A blob is scored on three cues: moderate ink density, an irregular
// outline, and a spread of outline points around the centre.

use image::{GrayImage, RgbImage};
use podcheck_core::config::PodConfig;
use podcheck_core::{BoundingBox, Confidence, SignatureCandidate};
use podcheck_imaging::ZoneImage;
use podcheck_imaging::raster::binarize::{adaptive_threshold, ink_density};
use podcheck_imaging::raster::morphology::close;
use podcheck_imaging::raster::{Polarity, Shape, StructuringElement, contour::external_shapes};
use tracing::{debug, info, instrument};

/// Local-mean window radius (a 21x21 block).
const BLOCK_RADIUS: u32 = 10;
const THRESHOLD_OFFSET: f64 = 10.0;
const ASPECT_RANGE: (f64, f64) = (0.5, 5.0);
/// Radial spread at which the variability cue saturates.
const SPREAD_SATURATION: f64 = 50.0;

pub struct SignatureDetector {
    min_area: f64,
    max_area: f64,
    confidence_threshold: f64,
    acknowledgement_zones: Vec<String>,
}

impl SignatureDetector {
    pub fn new(config: &PodConfig) -> Self {
        Self {
            min_area: config.thresholds.signature_min_area,
            max_area: config.thresholds.signature_max_area,
            confidence_threshold: config.thresholds.signature_confidence,
            acknowledgement_zones: config.acknowledgement_zones.clone(),
        }
    }

    /// Search every zone. Bounding boxes are returned in page coordinates.
    #[instrument(skip_all, fields(zones = zones.len()))]
    pub fn detect_zones(&self, zones: &[ZoneImage]) -> Vec<SignatureCandidate> {
        let found: Vec<SignatureCandidate> = zones
            .iter()
            .flat_map(|zone| self.detect_region(&zone.image, Some(&zone.name), zone.bounds))
            .collect();
        info!(
            count = found.len(),
            valid = found.iter().filter(|s| s.is_valid).count(),
            "Signatures detected"
        );
        found
    }

    /// Search a whole page that has no zone layout. Nothing found here is valid.
    pub fn detect_page(&self, image: &RgbImage) -> Vec<SignatureCandidate> {
        let bounds = BoundingBox::new(0, 0, image.width(), image.height());
        self.detect_region(image, None, bounds)
    }

    fn detect_region(&self, image: &RgbImage, region: Option<&str>, bounds: BoundingBox) -> Vec<SignatureCandidate> {
        if image.width() == 0 || image.height() == 0 {
            return Vec::new();
        }
        let gray = image::imageops::grayscale(image);
        let binary = adaptive_threshold(&gray, BLOCK_RADIUS, THRESHOLD_OFFSET, Polarity::InkMask);
        let binary = close(&binary, &StructuringElement::rect(3, 3));
        let is_valid = region.is_some_and(|name| self.acknowledgement_zones.iter().any(|z| z == name));

        let mut found = Vec::new();
        for shape in external_shapes(&binary) {
            if shape.area < self.min_area || shape.area > self.max_area {
                continue;
            }
            let aspect_ratio = shape.bbox.aspect_ratio();
            if !(ASPECT_RANGE.0..=ASPECT_RANGE.1).contains(&aspect_ratio) {
                continue;
            }
            let (confidence, density) = score(&binary, &shape);
            debug!(region, area = shape.area, aspect_ratio, density, confidence, "Signature candidate");
            if confidence < self.confidence_threshold {
                continue;
            }
            found.push(SignatureCandidate {
                bbox: shape.bbox.translate(bounds.x, bounds.y),
                confidence: Confidence::new(confidence),
                region: region.map(str::to_string),
                area: shape.area,
                aspect_ratio,
                density,
                is_valid,
            });
        }
        found
    }
}

/// Signature likelihood of `shape` and the ink density of its bounding box.
pub fn score(mask: &GrayImage, shape: &Shape) -> (f64, f64) {
    let b = shape.bbox;
    let density = ink_density(mask, b.x, b.y, b.width, b.height);
    let mut cues = vec![density_score(density), (1.0 - shape.circularity()).clamp(0.0, 1.0)];
    if let Some(spread) = shape.radial_std_dev() {
        cues.push((spread / SPREAD_SATURATION).min(1.0));
    }
    let confidence = cues.iter().sum::<f64>() / cues.len() as f64;
    (confidence.clamp(0.0, 1.0), density)
}

/// 1.0 for 10–50% ink, falling linearly to 0 at empty and at fully inked.
fn density_score(density: f64) -> f64 {
    if density < 0.1 {
        density / 0.1
    } else if density <= 0.5 {
        1.0
    } else {
        (1.0 - (density - 0.5) / 0.5).max(0.0)
    }
}
