// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Legibility analysis and the completeness check.
//
// Legibility is judged on the normalized page: the consensus text must carry
// enough of the required fields, at a high enough OCR confidence and text
// quality, from a page that was not blurry to begin with. Completeness is
// judged on the original capture: a page photographed with an edge cut off
// shows a flat, featureless strip along that edge.

use image::{DynamicImage, GrayImage, RgbImage};
use podcheck_core::config::{AnalysisConfig, PodConfig, RequiredField, Thresholds};
use podcheck_core::{BorderVariances, LegibilityReport};
use podcheck_imaging::Page;
use podcheck_ocr::{ConsensusEngine, ConsensusText};
use tracing::{debug, info, instrument, warn};

pub struct LegibilityAnalyzer {
    required_fields: Vec<RequiredField>,
    thresholds: Thresholds,
    analysis: AnalysisConfig,
}

impl LegibilityAnalyzer {
    pub fn new(config: &PodConfig) -> Self {
        Self {
            required_fields: config.required_fields.clone(),
            thresholds: config.thresholds.clone(),
            analysis: config.analysis.clone(),
        }
    }

    /// OCR the normalized page and assess legibility and completeness.
    #[instrument(skip_all, fields(source = %page.source, page = page.page_index))]
    pub fn analyze(&self, page: &Page, engine: &ConsensusEngine) -> LegibilityReport {
        let consensus = engine.recognize(&DynamicImage::ImageRgb8(page.normalized.clone()));
        let mut report = self.assess_text(
            &consensus.text,
            mean_token_confidence(&consensus),
            page.sharpness,
            page.is_blurry,
        );

        let (is_complete, variances) = self.check_completeness(&page.original);
        report.is_complete = is_complete;
        report.border_variances = variances;

        info!(
            legible = report.is_legible,
            complete = report.is_complete,
            fields = report.fields_detected.len(),
            of = self.required_fields.len(),
            "Legibility analyzed"
        );
        report
    }

    /// Judge already-extracted text. `ocr_confidence` is on a 0–100 scale.
    ///
    /// The returned report assumes a complete page; [`Self::analyze`] fills in
    /// the completeness fields.
    pub fn assess_text(&self, text: &str, ocr_confidence: f64, sharpness: f64, is_blurry: bool) -> LegibilityReport {
        let text = text.to_lowercase();
        let mut issues = Vec::new();
        let mut is_legible = true;

        if is_blurry {
            is_legible = false;
            issues.push(format!("Blurry image (score: {sharpness:.1})"));
        }

        let (fields_detected, fields_missing) = self.match_fields(&text);
        let word_count = text.split_whitespace().count();
        let text_quality = self.text_quality(&text, ocr_confidence, fields_detected.len(), word_count);

        if fields_detected.len() < self.thresholds.min_fields_detected {
            is_legible = false;
            issues.push(format!(
                "Insufficient fields detected: {}/{}",
                fields_detected.len(),
                self.thresholds.min_fields_detected
            ));
        }
        if text_quality < self.thresholds.min_text_quality {
            is_legible = false;
            issues.push(format!(
                "Low text quality: {text_quality:.2}/{}",
                self.thresholds.min_text_quality
            ));
        }
        if ocr_confidence < self.thresholds.min_confidence {
            is_legible = false;
            issues.push(format!(
                "Low OCR confidence: {ocr_confidence:.1}/{}",
                self.thresholds.min_confidence
            ));
        }

        debug!(ocr_confidence, text_quality, word_count, ?fields_missing, "Text assessed");
        LegibilityReport {
            is_legible,
            fields_detected,
            fields_missing,
            ocr_confidence,
            text_quality,
            word_count,
            is_blurry,
            sharpness,
            is_complete: true,
            border_variances: BorderVariances::default(),
            issues,
        }
    }

    /// Detected and missing field names, in configured order.
    fn match_fields(&self, lowercase_text: &str) -> (Vec<String>, Vec<String>) {
        let mut detected = Vec::new();
        let mut missing = Vec::new();
        for field in &self.required_fields {
            if field.matches(lowercase_text) {
                detected.push(field.name.clone());
            } else {
                missing.push(field.name.clone());
            }
        }
        (detected, missing)
    }

    /// Unweighted mean of confidence, field coverage, text amount and the
    /// share of alphanumeric or whitespace characters. Empty text has no
    /// character share, so the mean is over the other three.
    fn text_quality(&self, text: &str, ocr_confidence: f64, fields_detected: usize, word_count: usize) -> f64 {
        let confidence = (ocr_confidence / 100.0).clamp(0.0, 1.0);
        let coverage = fields_detected as f64 / self.required_fields.len().max(1) as f64;
        let amount = (word_count as f64 / self.analysis.word_count_ceiling.max(1) as f64).min(1.0);
        let total = text.chars().count();
        if total == 0 {
            return (confidence + coverage + amount) / 3.0;
        }
        let clean = text.chars().filter(|c| c.is_alphanumeric() || c.is_whitespace()).count() as f64 / total as f64;
        (confidence + coverage + amount + clean) / 4.0
    }

    /// True when every border strip of `original` shows enough variation.
    pub fn check_completeness(&self, original: &RgbImage) -> (bool, BorderVariances) {
        let variances = border_variances(original, self.analysis.border_width);
        let is_complete = variances.min() >= self.analysis.min_border_variance;
        if !is_complete {
            warn!(
                top = variances.top,
                bottom = variances.bottom,
                left = variances.left,
                right = variances.right,
                "Page looks cut off"
            );
        }
        (is_complete, variances)
    }
}

/// Mean token confidence of a consensus result, rescaled to 0–100.
pub fn mean_token_confidence(consensus: &ConsensusText) -> f64 {
    let tokens = consensus.token_confidences();
    if tokens.is_empty() {
        return 0.0;
    }
    tokens.iter().sum::<f64>() / tokens.len() as f64 * 100.0
}

/// Grey-level variance of the four `border_width`-pixel edge strips.
pub fn border_variances(original: &RgbImage, border_width: u32) -> BorderVariances {
    let gray = image::imageops::grayscale(original);
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return BorderVariances::default();
    }
    let bw = border_width.clamp(1, w.min(h));
    BorderVariances {
        top: region_variance(&gray, 0, 0, w, bw),
        bottom: region_variance(&gray, 0, h - bw, w, bw),
        left: region_variance(&gray, 0, 0, bw, h),
        right: region_variance(&gray, w - bw, 0, bw, h),
    }
}

fn region_variance(gray: &GrayImage, x: u32, y: u32, width: u32, height: u32) -> f64 {
    let n = width as f64 * height as f64;
    let (mut sum, mut sum_sq) = (0.0f64, 0.0f64);
    for yy in y..y + height {
        for xx in x..x + width {
            let v = gray.get_pixel(xx, yy).0[0] as f64;
            sum += v;
            sum_sq += v * v;
        }
    }
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}
