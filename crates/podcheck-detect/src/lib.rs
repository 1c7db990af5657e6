// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// podcheck-detect — Evidence of acknowledgement and readability.
//
// The legibility analyzer reads the page through the consensus engine and
// checks its borders for cut-off capture. The three detectors share one
// recipe: binarize, close, take outer contours, filter on geometry, score.
// Stamps and annotations are then read back through the consensus engine.

pub mod annotation;
pub mod legibility;
pub mod signature;
pub mod stamp;

pub use annotation::{AnnotationDetector, sentiment_of};
pub use legibility::{LegibilityAnalyzer, border_variances};
pub use signature::SignatureDetector;
pub use stamp::StampDetector;

#[cfg(test)]
pub(crate) mod testing {
    use image::{DynamicImage, Rgb, RgbImage};
    use podcheck_core::Result;
    use podcheck_core::config::ConsensusMethod;
    use podcheck_ocr::{ConsensusEngine, OcrBackend, RecognizedText};
    use std::sync::Arc;

    /// Returns the same text for every image.
    pub struct FixedBackend {
        pub text: &'static str,
        pub confidence: f64,
    }

    impl OcrBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        fn recognize(&self, _image: &DynamicImage) -> Result<RecognizedText> {
            Ok(RecognizedText::new(self.text, self.confidence))
        }
    }

    pub fn engine(text: &'static str, confidence: f64) -> ConsensusEngine {
        ConsensusEngine::new(vec![Arc::new(FixedBackend { text, confidence })], ConsensusMethod::Voting)
    }

    pub fn white(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))
    }

    pub fn fill_rect(image: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, value: u8) {
        for yy in y..(y + h).min(image.height()) {
            for xx in x..(x + w).min(image.width()) {
                image.put_pixel(xx, yy, Rgb([value, value, value]));
            }
        }
    }

    /// Draw a one-pixel-wide polyline by dense sampling, `thickness` pixels square.
    pub fn stroke(image: &mut RgbImage, points: &[(f32, f32)], thickness: u32) {
        for pair in points.windows(2) {
            let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
            let steps = ((x1 - x0).abs().max((y1 - y0).abs()) * 2.0).ceil().max(1.0) as u32;
            for s in 0..=steps {
                let t = s as f32 / steps as f32;
                let x = (x0 + (x1 - x0) * t).round() as u32;
                let y = (y0 + (y1 - y0) * t).round() as u32;
                fill_rect(image, x, y, thickness, thickness, 0);
            }
        }
    }

    /// Ring of ink between `inner` and `outer` radii.
    pub fn ring(image: &mut RgbImage, cx: f32, cy: f32, inner: f32, outer: f32) {
        for y in 0..image.height() {
            for x in 0..image.width() {
                let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
                if d >= inner && d <= outer {
                    image.put_pixel(x, y, Rgb([0, 0, 0]));
                }
            }
        }
    }
}
