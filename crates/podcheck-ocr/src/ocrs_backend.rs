// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pure-Rust OCR backend built on the `ocrs` crate, with neural network models
// executed via `rten`.
//
// # Feature Gate
//
// Only compiled with the `ocr` feature:
//
// ```toml
// podcheck-ocr = { path = "crates/podcheck-ocr", features = ["ocr"] }
// ```
//
// # Model Setup
//
// The model directory is configured explicitly and must contain:
//
// - `text-detection.rten` — locates text regions in the image.
// - `text-recognition.rten` — decodes characters from detected regions.
//
// `ocrs` reports no confidence scores, so this backend reports a configured
// nominal confidence for any non-empty result and zero for empty output.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine as OcrsEngine, OcrEngineParams};
use podcheck_core::error::{PodError, Result};
use rten::Model;
use tracing::{debug, info, instrument};

use crate::backend::{OcrBackend, RecognizedText};

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// Paths to the two model files.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrsModels {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl OcrsModels {
    /// Expect both well-known model files inside `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    /// Verify that both model files exist.
    pub fn validate(&self) -> Result<()> {
        for (kind, path) in [
            ("detection", &self.detection_model_path),
            ("recognition", &self.recognition_model_path),
        ] {
            if !path.exists() {
                return Err(PodError::OcrError(format!(
                    "{kind} model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// `ocrs` engine exposed as an [`OcrBackend`].
///
/// Model loading is the expensive step; build one backend and share it.
pub struct OcrsBackend {
    engine: OcrsEngine,
    nominal_confidence: f64,
}

impl OcrsBackend {
    /// Load both models.
    ///
    /// **Important:** `ocrs` and `rten` must be compiled in release mode.
    /// Debug builds are 10-100x slower.
    #[instrument(skip_all, fields(
        detection = %models.detection_model_path.display(),
        recognition = %models.recognition_model_path.display(),
    ))]
    pub fn new(models: OcrsModels, nominal_confidence: f64) -> Result<Self> {
        models.validate()?;

        info!("Loading OCR detection model");
        let detection_model = Model::load_file(&models.detection_model_path).map_err(|err| {
            PodError::OcrError(format!(
                "failed to load detection model from {}: {}",
                models.detection_model_path.display(),
                err
            ))
        })?;

        info!("Loading OCR recognition model");
        let recognition_model = Model::load_file(&models.recognition_model_path).map_err(|err| {
            PodError::OcrError(format!(
                "failed to load recognition model from {}: {}",
                models.recognition_model_path.display(),
                err
            ))
        })?;

        let engine = OcrsEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| PodError::OcrError(format!("failed to initialise OCR engine: {}", err)))?;

        info!("OCR engine initialised successfully");
        Ok(Self {
            engine,
            nominal_confidence: nominal_confidence.clamp(0.0, 1.0),
        })
    }

    pub fn from_model_dir(dir: impl AsRef<Path>, nominal_confidence: f64) -> Result<Self> {
        Self::new(OcrsModels::from_dir(dir), nominal_confidence)
    }
}

impl OcrBackend for OcrsBackend {
    fn name(&self) -> &str {
        "ocrs"
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn recognize(&self, image: &DynamicImage) -> Result<RecognizedText> {
        // Convert to RGB8, the format expected by ocrs.
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            PodError::OcrError(format!("failed to create image source ({}x{}): {}", width, height, err))
        })?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| PodError::OcrError(format!("OCR preprocessing failed: {}", err)))?;
        let text = self
            .engine
            .get_text(&input)
            .map_err(|err| PodError::OcrError(format!("OCR text recognition failed: {}", err)))?;

        debug!(line_count = text.lines().count(), char_count = text.len(), "OCR recognition complete");
        let confidence = if text.trim().is_empty() { 0.0 } else { self.nominal_confidence };
        Ok(RecognizedText::new(text, confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn models_from_dir() {
        let models = OcrsModels::from_dir("/tmp/my-models");
        assert_eq!(models.detection_model_path, PathBuf::from("/tmp/my-models/text-detection.rten"));
        assert_eq!(models.recognition_model_path, PathBuf::from("/tmp/my-models/text-recognition.rten"));
    }

    #[test]
    fn missing_models_fail_validation() {
        let err = OcrsModels::from_dir("/nonexistent/path/ocr-models").validate().unwrap_err();
        assert!(matches!(err, PodError::OcrError(_)));
        assert!(OcrsBackend::from_model_dir("/nonexistent/path/ocr-models", 0.85).is_err());
    }
}
