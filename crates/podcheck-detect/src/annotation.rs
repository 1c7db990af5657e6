// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Handwritten annotation detection and keyword sentiment.
//
// Strokes are grouped into regions by closing along rows and columns
// separately, merging the two, then dilating. Regions of moderate ink density
// are read through the consensus engine after contrast equalization and
// tagged positive, negative or neutral by keyword counts.

use image::{DynamicImage, GrayImage, RgbImage};
use podcheck_core::config::{AnnotationKeywords, PodConfig};
use podcheck_core::{AnnotationRegion, AnnotationReport, BoundingBox, Confidence, Sentiment};
use podcheck_imaging::normalize::contrast::{ClipPolicy, clahe};
use podcheck_imaging::raster::binarize::{adaptive_threshold, ink_density, otsu_threshold};
use podcheck_imaging::raster::contour::external_shapes;
use podcheck_imaging::raster::morphology::{close, dilate_n, union};
use podcheck_imaging::raster::{Plane, Polarity, StructuringElement};
use podcheck_imaging::zones::crop;
use podcheck_ocr::ConsensusEngine;
use tracing::{debug, info, instrument};

/// Local-mean window radius (a 15x15 block).
const BLOCK_RADIUS: u32 = 7;
const THRESHOLD_OFFSET: f64 = 10.0;
const BAR_LENGTH: u32 = 20;
const MERGE_SIZE: u32 = 10;
const MERGE_ITERATIONS: u32 = 2;
const ASPECT_RANGE: (f64, f64) = (0.5, 20.0);
/// Ink density band typical of handwriting.
const DENSITY_BAND: (f64, f64) = (0.05, 0.4);
const OCR_CLIP_LIMIT: f32 = 2.0;
const OCR_GRID: u32 = 8;

pub struct AnnotationDetector {
    keywords: AnnotationKeywords,
    min_area: f64,
    min_confidence: f64,
}

impl AnnotationDetector {
    pub fn new(config: &PodConfig) -> Self {
        Self {
            keywords: config.annotation_keywords.clone(),
            min_area: config.analysis.annotation_min_area,
            min_confidence: config.thresholds.handwriting_confidence,
        }
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn detect(&self, image: &RgbImage, engine: &ConsensusEngine) -> AnnotationReport {
        let regions: Vec<AnnotationRegion> = self
            .candidate_regions(image)
            .into_iter()
            .map(|(bbox, density, confidence)| {
                let text = read_handwriting(image, bbox, engine);
                let sentiment = sentiment_of(&text, &self.keywords);
                debug!(?bbox, density, text = %text, ?sentiment, "Annotation region");
                AnnotationRegion {
                    bbox,
                    confidence: Confidence::new(confidence),
                    density,
                    text,
                    sentiment,
                }
            })
            .collect();

        let report = AnnotationReport::from_regions(regions);
        info!(count = report.regions.len(), sentiment = ?report.sentiment, "Annotations detected");
        report
    }

    /// Handwriting-like regions as (bbox, ink density, confidence).
    fn candidate_regions(&self, image: &RgbImage) -> Vec<(BoundingBox, f64, f64)> {
        if image.width() == 0 || image.height() == 0 {
            return Vec::new();
        }
        let gray = image::imageops::grayscale(image);
        let ink = adaptive_threshold(&gray, BLOCK_RADIUS, THRESHOLD_OFFSET, Polarity::InkMask);
        let rows = close(&ink, &StructuringElement::rect(BAR_LENGTH, 1));
        let cols = close(&ink, &StructuringElement::rect(1, BAR_LENGTH));
        let merged = dilate_n(
            &union(&rows, &cols),
            &StructuringElement::rect(MERGE_SIZE, MERGE_SIZE),
            MERGE_ITERATIONS,
        );

        external_shapes(&merged)
            .into_iter()
            .filter(|s| s.area > self.min_area)
            .filter(|s| (ASPECT_RANGE.0..=ASPECT_RANGE.1).contains(&s.bbox.aspect_ratio()))
            .filter_map(|s| {
                let b = s.bbox;
                let density = ink_density(&ink, b.x, b.y, b.width, b.height);
                if !(DENSITY_BAND.0..=DENSITY_BAND.1).contains(&density) {
                    return None;
                }
                let confidence = band_confidence(density);
                (confidence >= self.min_confidence).then_some((b, density, confidence))
            })
            .collect()
    }
}

/// 1.0 at the centre of the density band, 0.5 at its edges.
fn band_confidence(density: f64) -> f64 {
    let centre = (DENSITY_BAND.0 + DENSITY_BAND.1) / 2.0;
    let half_width = (DENSITY_BAND.1 - DENSITY_BAND.0) / 2.0;
    (1.0 - 0.5 * (density - centre).abs() / half_width).clamp(0.0, 1.0)
}

/// Equalize and binarize a region before OCR. Returns lowercased text.
fn read_handwriting(image: &RgbImage, bbox: BoundingBox, engine: &ConsensusEngine) -> String {
    let gray = image::imageops::grayscale(&crop(image, bbox));
    let equalized = clahe(&Plane::from_gray(&gray), OCR_GRID, ClipPolicy::Fixed(OCR_CLIP_LIMIT)).to_gray();
    let binary: GrayImage = otsu_threshold(&equalized, Polarity::Document);
    engine
        .recognize(&DynamicImage::ImageLuma8(binary))
        .text
        .trim()
        .to_lowercase()
}

/// Tone of `text` by keyword counts: more negative hits is negative, more
/// positive hits is positive, anything else neutral.
pub fn sentiment_of(text: &str, keywords: &AnnotationKeywords) -> Sentiment {
    let text = text.to_lowercase();
    let hits = |list: &[String]| list.iter().filter(|k| text.contains(&k.to_lowercase())).count();
    let positive = hits(&keywords.positive);
    let negative = hits(&keywords.negative);
    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Sentiment::Positive,
        std::cmp::Ordering::Less => Sentiment::Negative,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{engine, stroke, white};

    fn keywords() -> AnnotationKeywords {
        PodConfig::default().annotation_keywords
    }

    /// A line of tight zigzag "handwriting" from x0 to x1.
    fn scrawl(image: &mut RgbImage, x0: f32, x1: f32, y: f32) {
        let mut points = Vec::new();
        let mut x = x0;
        let mut up = true;
        while x <= x1 {
            points.push((x, if up { y } else { y + 20.0 }));
            up = !up;
            x += 4.0;
        }
        stroke(image, &points, 2);
    }

    #[test]
    fn keyword_counts_decide_sentiment() {
        let k = keywords();
        assert_eq!(sentiment_of("Recibido conforme", &k), Sentiment::Positive);
        assert_eq!(sentiment_of("falta una caja", &k), Sentiment::Negative);
        assert_eq!(sentiment_of("recibido, falta una caja", &k), Sentiment::Neutral);
        assert_eq!(sentiment_of("", &k), Sentiment::Neutral);
    }

    #[test]
    fn band_confidence_is_highest_mid_band() {
        assert!((band_confidence(0.225) - 1.0).abs() < 1e-9);
        assert!((band_confidence(0.05) - 0.5).abs() < 1e-9);
        assert!((band_confidence(0.4) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn blank_page_has_no_annotations() {
        let report = AnnotationDetector::new(&PodConfig::default()).detect(&white(300, 200), &engine("recibido", 0.9));
        assert!(!report.has_annotations);
        assert_eq!(report.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn handwriting_is_read_and_tagged() {
        let mut page = white(300, 200);
        scrawl(&mut page, 60.0, 220.0, 90.0);
        let report = AnnotationDetector::new(&PodConfig::default()).detect(&page, &engine("Material DAÑADO", 0.7));
        assert_eq!(report.regions.len(), 1, "{report:?}");
        let region = &report.regions[0];
        assert!(DENSITY_BAND.0 <= region.density && region.density <= DENSITY_BAND.1);
        assert_eq!(region.text, "material dañado");
        assert_eq!(region.sentiment, Sentiment::Negative);
        assert_eq!(report.sentiment, Sentiment::Negative);
        assert_eq!(report.text_content, "material dañado");
    }
}
