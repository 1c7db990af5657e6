// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// podcheck-imaging — Page loading, image normalization and zone extraction.
//
// Provides the staged normalizer (orientation, resize, adaptive contrast,
// denoise, illumination, sharpening, deblur, perspective, super-resolution),
// capture-quality assessment, fractional zone cropping, and the raster
// primitives (thresholding, morphology, contours) the detectors build on.

pub mod normalize;
pub mod page;
pub mod quality;
pub mod raster;
pub mod zones;

// Re-export the primary types so callers can use `podcheck_imaging::Page` etc.
pub use normalize::{Normalized, Normalizer};
pub use page::Page;
pub use raster::ImageProcessor;
pub use zones::{ZoneImage, extract_zones};
