// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster primitives shared by the normalizer and the detectors.

pub mod binarize;
pub mod contour;
pub mod filter;
pub mod morphology;
pub mod plane;
pub mod processor;

pub use binarize::Polarity;
pub use contour::Shape;
pub use morphology::StructuringElement;
pub use plane::{LumaChroma, Plane};
pub use processor::ImageProcessor;
