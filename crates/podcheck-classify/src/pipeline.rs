// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Single-document pipeline: decode, normalize, extract zones, detect,
// classify.
//
// The OCR engine is passed in per call so batch workers can each bring a
// checked-out engine. A detector that panics is reported as a warning issue
// and treated as having found nothing; only undecodable input fails the
// document.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use image::RgbImage;
use podcheck_core::config::PodConfig;
use podcheck_core::error::{PodError, Result};
use podcheck_core::{AnnotationReport, ClassificationResult, DetectionDetails, Issue, LegibilityReport, StageStatus};
use podcheck_detect::{AnnotationDetector, LegibilityAnalyzer, SignatureDetector, StampDetector};
use podcheck_imaging::{Normalizer, Page, extract_zones};
use podcheck_ocr::ConsensusEngine;
use tracing::{info, instrument, warn};

use crate::classifier::Classifier;

/// Everything needed to classify documents under one configuration.
pub struct Pipeline {
    config: PodConfig,
    normalizer: Normalizer,
    legibility: LegibilityAnalyzer,
    signatures: SignatureDetector,
    stamps: StampDetector,
    annotations: AnnotationDetector,
    classifier: Classifier,
}

impl Pipeline {
    /// Validate `config` and build every stage from it.
    pub fn new(config: PodConfig) -> Result<Self> {
        config.validate()?;
        info!(
            zones = config.zones.len(),
            required_fields = config.required_fields.len(),
            level = ?config.normalizer.level,
            "Pipeline configured"
        );
        Ok(Self {
            normalizer: Normalizer::new(config.normalizer.clone()),
            legibility: LegibilityAnalyzer::new(&config),
            signatures: SignatureDetector::new(&config),
            stamps: StampDetector::new(&config),
            annotations: AnnotationDetector::new(&config),
            classifier: Classifier::new(&config),
            config,
        })
    }

    pub fn config(&self) -> &PodConfig {
        &self.config
    }

    #[instrument(skip(self, engine), fields(path = %path.as_ref().display()))]
    pub fn process_file(&self, path: impl AsRef<Path>, engine: &ConsensusEngine) -> Result<ClassificationResult> {
        let page = Page::open(path, 0, &self.normalizer, self.config.thresholds.blur_threshold)?;
        Ok(self.classify_page(&page, engine))
    }

    /// Classify encoded image bytes. The page digest is taken from `bytes`.
    pub fn process_bytes(&self, bytes: &[u8], source: &str, engine: &ConsensusEngine) -> Result<ClassificationResult> {
        let page = Page::from_bytes(bytes, source, 0, &self.normalizer, self.config.thresholds.blur_threshold)?;
        Ok(self.classify_page(&page, engine))
    }

    /// Classify an already-decoded image.
    pub fn process_image(&self, image: RgbImage, source: &str, engine: &ConsensusEngine) -> Result<ClassificationResult> {
        let page = Page::from_image(image, source, 0, &self.normalizer, self.config.thresholds.blur_threshold)?;
        Ok(self.classify_page(&page, engine))
    }

    /// Run the detectors over a prepared page and classify the result.
    #[instrument(skip_all, fields(source = %page.source, page = page.page_index))]
    pub fn classify_page(&self, page: &Page, engine: &ConsensusEngine) -> ClassificationResult {
        let mut notes = Vec::new();

        for stage in page.normalization().degraded() {
            if let StageStatus::Degraded { reason } = &stage.status {
                notes.push(Issue::warning(PodError::stage(stage.stage.as_str(), reason.clone()).to_string()));
            }
        }
        if engine.is_disabled() {
            notes.push(Issue::warning("No OCR backends configured; text checks ran on empty text"));
        }

        let legibility = guarded(
            "legibility analysis",
            &mut notes,
            || self.legibility.analyze(page, engine),
            || self.failed_legibility(page),
        );

        let zones = extract_zones(&page.normalized, &self.config.zones);
        let signatures = guarded(
            "signature detection",
            &mut notes,
            || {
                if zones.is_empty() {
                    self.signatures.detect_page(&page.normalized)
                } else {
                    self.signatures.detect_zones(&zones)
                }
            },
            Vec::new,
        );
        let stamps = guarded(
            "stamp detection",
            &mut notes,
            || self.stamps.detect(&page.normalized, engine),
            Vec::new,
        );
        let annotations = guarded(
            "annotation detection",
            &mut notes,
            || self.annotations.detect(&page.normalized, engine),
            AnnotationReport::default,
        );

        let details = DetectionDetails {
            legibility,
            signatures,
            stamps,
            annotations,
        };
        self.classifier.classify(page.metadata(), details, notes)
    }

    /// Stand-in report when the analyzer itself failed. Completeness is still
    /// checked, since it needs no OCR.
    fn failed_legibility(&self, page: &Page) -> LegibilityReport {
        let (is_complete, border_variances) = self.legibility.check_completeness(&page.original);
        LegibilityReport {
            is_legible: false,
            fields_missing: self.config.required_fields.iter().map(|f| f.name.clone()).collect(),
            is_blurry: page.is_blurry,
            sharpness: page.sharpness,
            is_complete,
            border_variances,
            issues: vec!["Legibility could not be assessed".to_string()],
            ..LegibilityReport::default()
        }
    }
}

/// Run `work`, turning a panic into a warning issue and the `fallback` value.
fn guarded<T>(stage: &str, notes: &mut Vec<Issue>, work: impl FnOnce() -> T, fallback: impl FnOnce() -> T) -> T {
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(value) => value,
        Err(payload) => {
            let err = PodError::stage(stage, panic_message(payload.as_ref()));
            warn!(error = %err, "Detector failed; continuing without it");
            notes.push(Issue::warning(err.to_string()));
            fallback()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked".to_string()
    }
}
