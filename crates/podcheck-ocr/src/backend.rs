// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The OCR backend seam. Every engine the consensus layer can drive implements
// `OcrBackend`; instances are shared across worker threads.

use image::DynamicImage;
use podcheck_core::error::Result;
use serde::{Deserialize, Serialize};

/// A recognized word with the engine's confidence in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub confidence: f64,
}

/// Text extracted by one backend from one image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecognizedText {
    pub text: String,
    /// Overall confidence in [0, 1].
    pub confidence: f64,
    /// Token-level detail, when the engine reports it.
    pub words: Vec<Word>,
}

impl RecognizedText {
    /// Text with a single overall confidence and no token detail.
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence: sanitize(confidence),
            words: Vec::new(),
        }
    }

    /// Build from tokens; the overall confidence is their mean.
    pub fn from_words(text: impl Into<String>, words: Vec<Word>) -> Self {
        let confidence = if words.is_empty() {
            0.0
        } else {
            words.iter().map(|w| w.confidence).sum::<f64>() / words.len() as f64
        };
        Self {
            text: text.into(),
            confidence: sanitize(confidence),
            words,
        }
    }
}

/// An OCR engine callable from several threads at once.
///
/// A failure is reported as an `Err` and isolated by the consensus engine;
/// it never aborts the other backends.
pub trait OcrBackend: Send + Sync {
    /// Short stable identifier used in consensus metadata, e.g. `"tesseract"`.
    fn name(&self) -> &str;

    fn recognize(&self, image: &DynamicImage) -> Result<RecognizedText>;
}

pub(crate) fn sanitize(confidence: f64) -> f64 {
    if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_mean_becomes_overall_confidence() {
        let text = RecognizedText::from_words(
            "acme corp",
            vec![
                Word { text: "acme".into(), confidence: 0.9 },
                Word { text: "corp".into(), confidence: 0.7 },
            ],
        );
        assert!((text.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn confidences_are_clamped() {
        assert_eq!(RecognizedText::new("x", 1.7).confidence, 1.0);
        assert_eq!(RecognizedText::new("x", f64::NAN).confidence, 0.0);
        assert_eq!(RecognizedText::from_words("", vec![]).confidence, 0.0);
    }
}
