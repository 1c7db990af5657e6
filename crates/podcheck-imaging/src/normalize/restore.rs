// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Restoration stages for poor captures: Richardson–Lucy deconvolution for
// blurred pages and 2x upscaling for low-resolution ones.

use image::RgbImage;
use image::imageops::FilterType;
use imageproc::filter::bilateral_filter;
use tracing::debug;

use crate::raster::filter::{convolve_symmetric, unsharp_mask};
use crate::raster::plane::{Plane, map_luma};
use crate::raster::ImageProcessor;

/// Side of the square point-spread function assumed for camera blur.
pub const PSF_SIZE: usize = 5;
pub const PSF_SIGMA: f32 = 1.5;

/// Normalized `size x size` Gaussian point-spread function.
pub fn gaussian_psf(size: usize, sigma: f32) -> Vec<f32> {
    let half = (size / 2) as i32;
    let denom = 2.0 * sigma * sigma;
    let mut psf: Vec<f32> = (-half..=half)
        .flat_map(|y| (-half..=half).map(move |x| (x, y)))
        .map(|(x, y)| (-((x * x + y * y) as f32) / denom).exp())
        .collect();
    let sum: f32 = psf.iter().sum();
    for v in &mut psf {
        *v /= sum;
    }
    psf
}

/// Richardson–Lucy deconvolution of a luma plane.
///
/// The PSF is symmetric, so it doubles as its own mirror in the correction
/// step. Values are kept positive throughout and clamped to 0–255 at the end.
pub fn richardson_lucy(observed: &Plane, psf: &[f32], size: usize, iterations: u32) -> Plane {
    // Work on a positive copy so the ratio never divides by zero.
    let observed = observed.map(|v| v.max(1.0));
    let mut estimate = observed.clone();
    for _ in 0..iterations {
        let reblurred = convolve_symmetric(&estimate, psf, size);
        let ratio = observed.zip_map(&reblurred, |o, r| o / r.max(1e-3));
        let correction = convolve_symmetric(&ratio, psf, size);
        estimate = estimate.zip_map(&correction, |e, c| e * c);
    }
    estimate.map(|v| v.clamp(0.0, 255.0))
}

/// Bilateral window applied after upscaling, and its colour and space sigmas.
const BILATERAL_WINDOW: u32 = 5;
const BILATERAL_SIGMA_COLOR: f32 = 25.0;
const BILATERAL_SIGMA_SPACE: f32 = 2.0;

/// Upscale 2x with Lanczos3, then unsharp-mask and bilateral-smooth the luma.
pub fn super_resolve(image: &RgbImage) -> RgbImage {
    let upscaled = ImageProcessor::from_rgb(image.clone())
        .scale(2.0, FilterType::Lanczos3)
        .into_rgb8();
    debug!(width = upscaled.width(), height = upscaled.height(), "Upscaled page");
    map_luma(&upscaled, |luma| {
        let sharpened = unsharp_mask(luma, 1.0, 0.5).to_gray();
        Plane::from_gray(&bilateral_filter(
            &sharpened,
            BILATERAL_WINDOW,
            BILATERAL_SIGMA_COLOR,
            BILATERAL_SIGMA_SPACE,
        ))
    })
}

/// Chroma-preserving deblur of an RGB page.
pub fn deblur(image: &RgbImage, iterations: u32) -> RgbImage {
    let psf = gaussian_psf(PSF_SIZE, PSF_SIGMA);
    map_luma(image, |luma| richardson_lucy(luma, &psf, PSF_SIZE, iterations))
}
