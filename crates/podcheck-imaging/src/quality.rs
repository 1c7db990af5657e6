// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capture-quality assessment of a page before normalization.
//
// Six sub-scores on a 0–100 scale are combined into a weighted overall score
// and letter grade. Weak sub-scores produce human-readable weak points and
// enhancement recommendations.

use image::imageops::FilterType;
use image::{GrayImage, RgbImage};
use imageproc::edges::canny;
use podcheck_core::{QualityAssessment, QualityGrade};
use tracing::{debug, instrument};

use crate::raster::ImageProcessor;
use crate::raster::filter::laplacian_variance;
use crate::raster::plane::Plane;

/// Longest side of the working copy used for the pixel statistics.
const ASSESSMENT_MAX_SIDE: u32 = 1200;

/// Sub-scores below this count as weak points.
const WEAK_SCORE: f64 = 60.0;

const W_SHARPNESS: f64 = 0.25;
const W_CONTRAST: f64 = 0.20;
const W_BRIGHTNESS: f64 = 0.10;
const W_NOISE: f64 = 0.15;
const W_RESOLUTION: f64 = 0.15;
const W_TEXT_CLARITY: f64 = 0.15;

/// Assess `image`. Resolution is scored on the full-size dimensions; every
/// other metric on a copy downscaled to at most 1200 pixels.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn assess(image: &RgbImage) -> QualityAssessment {
    if image.width() == 0 || image.height() == 0 {
        return QualityAssessment {
            weak_points: vec!["empty image".into()],
            recommendations: vec!["re-scan the document".into()],
            ..QualityAssessment::default()
        };
    }

    let longest = image.width().max(image.height());
    let working = if longest > ASSESSMENT_MAX_SIDE {
        ImageProcessor::from_rgb(image.clone())
            .resize(ASSESSMENT_MAX_SIDE, ASSESSMENT_MAX_SIDE, FilterType::Triangle)
            .into_rgb8()
    } else {
        image.clone()
    };
    let gray = image::imageops::grayscale(&working);
    let plane = Plane::from_gray(&gray);

    let sharpness = sharpness_score(laplacian_variance(&plane));
    let contrast = contrast_score(plane.std_dev());
    let brightness = brightness_score(plane.mean());
    let noise = noise_score(estimate_noise_sigma(&plane));
    let resolution = resolution_score(longest);
    let text_clarity = text_clarity_score(edge_density(&gray));

    let overall_score = W_SHARPNESS * sharpness
        + W_CONTRAST * contrast
        + W_BRIGHTNESS * brightness
        + W_NOISE * noise
        + W_RESOLUTION * resolution
        + W_TEXT_CLARITY * text_clarity;

    let mut weak_points = Vec::new();
    let mut recommendations = Vec::new();
    let checks: [(f64, &str, &str); 6] = [
        (sharpness, "image is blurry", "apply deblurring or re-capture with steady focus"),
        (contrast, "low contrast", "apply local contrast enhancement"),
        (brightness, "poor exposure", "correct illumination or re-capture in even light"),
        (noise, "high noise level", "apply denoising"),
        (resolution, "low resolution", "scan at higher resolution or apply super-resolution"),
        (text_clarity, "text edges are unclear", "sharpen the page before OCR"),
    ];
    for (score, weakness, remedy) in checks {
        if score < WEAK_SCORE {
            weak_points.push(weakness.to_string());
            recommendations.push(remedy.to_string());
        }
    }

    debug!(overall_score, sharpness, contrast, brightness, noise, resolution, text_clarity, "Quality assessed");
    QualityAssessment {
        overall_score,
        grade: QualityGrade::from_score(overall_score),
        sharpness,
        contrast,
        brightness,
        noise,
        resolution,
        text_clarity,
        weak_points,
        recommendations,
    }
}

fn sharpness_score(laplacian_var: f64) -> f64 {
    (laplacian_var / 500.0).min(1.0) * 100.0
}

fn contrast_score(std_dev: f64) -> f64 {
    (std_dev / 60.0).min(1.0) * 100.0
}

/// Full marks for a mean luma in 120–210, falling off linearly outside.
fn brightness_score(mean: f64) -> f64 {
    if mean < 120.0 {
        mean / 120.0 * 100.0
    } else if mean > 210.0 {
        ((255.0 - mean) / 45.0 * 100.0).max(0.0)
    } else {
        100.0
    }
}

/// Immerkær's fast noise-sigma estimate from a Laplacian-difference mask.
pub fn estimate_noise_sigma(plane: &Plane) -> f64 {
    let (w, h) = (plane.width(), plane.height());
    if w < 3 || h < 3 {
        return 0.0;
    }
    const MASK: [f32; 9] = [1.0, -2.0, 1.0, -2.0, 4.0, -2.0, 1.0, -2.0, 1.0];
    let mut total = 0.0f64;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut acc = 0.0f32;
            for ky in 0..3u32 {
                for kx in 0..3u32 {
                    acc += MASK[(ky * 3 + kx) as usize] * plane.get(x + kx - 1, y + ky - 1);
                }
            }
            total += acc.abs() as f64;
        }
    }
    let interior = ((w - 2) as f64) * ((h - 2) as f64);
    total * (std::f64::consts::FRAC_PI_2).sqrt() / (6.0 * interior)
}

fn noise_score(sigma: f64) -> f64 {
    if sigma <= 2.0 {
        100.0
    } else {
        (100.0 - (sigma - 2.0) * 10.0).max(0.0)
    }
}

fn resolution_score(longest_side: u32) -> f64 {
    match longest_side {
        s if s >= 2000 => 100.0,
        s if s >= 1500 => 85.0,
        s if s >= 1000 => 70.0,
        s if s >= 600 => 50.0,
        _ => 25.0,
    }
}

/// Share of pixels on a Canny edge.
fn edge_density(gray: &GrayImage) -> f64 {
    let edges = canny(gray, 50.0, 150.0);
    let on = edges.pixels().filter(|p| p.0[0] > 0).count();
    on as f64 / (gray.width() as f64 * gray.height() as f64)
}

/// Full marks for an edge density in 0.02–0.15, typical of printed text.
fn text_clarity_score(density: f64) -> f64 {
    if density < 0.02 {
        density / 0.02 * 100.0
    } else if density > 0.15 {
        (100.0 - (density - 0.15) / 0.15 * 100.0).max(0.0)
    } else {
        100.0
    }
}
