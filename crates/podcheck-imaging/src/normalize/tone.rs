// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Illumination flattening and blended sharpening on the luma plane.

use crate::raster::Plane;
use crate::raster::filter::{convolve3x3, gaussian_blur};

/// Sigma of the background estimate; matches a 51-pixel box of support.
pub const ILLUMINATION_SIGMA: f32 = 8.0;

const SHARPEN_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0];

/// Divide luma by a blurred background estimate and rescale to 0–255.
///
/// Paper under a shadow and paper under direct light both map to white,
/// while ink stays proportionally darker than its local surroundings.
pub fn flatten_illumination(luma: &Plane, sigma: f32) -> Plane {
    let background = gaussian_blur(luma, sigma);
    luma.zip_map(&background, |v, bg| (v / bg.max(1.0) * 255.0).clamp(0.0, 255.0))
}

/// Sharpen with a 3x3 high-boost kernel, then blend `mix` of the sharpened
/// result with `1 - mix` of the input. `mix` is clamped below 1.
pub fn sharpen_blend(luma: &Plane, mix: f32) -> Plane {
    let mix = mix.clamp(0.0, 0.95);
    let sharpened = convolve3x3(luma, &SHARPEN_KERNEL);
    luma.zip_map(&sharpened, |orig, sharp| {
        (mix * sharp + (1.0 - mix) * orig).clamp(0.0, 255.0)
    })
}
