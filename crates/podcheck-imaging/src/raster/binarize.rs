// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Thresholding — local-mean adaptive and global Otsu.
//
// Detectors want *ink masks*: ink pixels are 255 and paper is 0, which is the
// foreground convention of `imageproc::contours`. OCR wants the opposite, dark
// text on white, so both polarities are provided.

use image::{GrayImage, Luma};
use tracing::debug;

/// Output polarity of a thresholding pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Ink becomes 255, paper 0.
    InkMask,
    /// Ink becomes 0, paper 255.
    Document,
}

impl Polarity {
    #[inline]
    fn paint(self, is_ink: bool) -> u8 {
        match (self, is_ink) {
            (Self::InkMask, true) | (Self::Document, false) => 255,
            _ => 0,
        }
    }
}

/// Adaptive thresholding against the local mean.
///
/// A pixel is ink when it is at or below `mean(block) - c`, where the block is
/// the `(2 * block_radius + 1)` square centred on it, clipped to the image.
pub fn adaptive_threshold(gray: &GrayImage, block_radius: u32, c: f64, polarity: Polarity) -> GrayImage {
    let (width, height) = gray.dimensions();
    let integral = IntegralImage::new(gray);

    GrayImage::from_fn(width, height, |x, y| {
        let threshold = integral.region_mean(x, y, block_radius) - c;
        let is_ink = gray.get_pixel(x, y).0[0] as f64 <= threshold;
        Luma([polarity.paint(is_ink)])
    })
}

/// Global thresholding at the Otsu level. Pixels at or below the level are ink.
pub fn otsu_threshold(gray: &GrayImage, polarity: Polarity) -> GrayImage {
    let level = otsu_level(gray);
    debug!(level, "Otsu threshold computed");
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([polarity.paint(gray.get_pixel(x, y).0[0] <= level)])
    })
}

/// Threshold that maximises the between-class variance of the histogram.
pub fn otsu_level(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total_pixels = gray.width() as u64 * gray.height() as u64;
    if total_pixels == 0 {
        return 128;
    }

    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut sum_background = 0.0f64;
    let mut weight_background = 0u64;
    let mut max_variance = 0.0f64;
    let mut best_threshold = 0u8;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total_pixels - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;

        let between_variance = weight_background as f64
            * weight_foreground as f64
            * (mean_background - mean_foreground).powi(2);

        if between_variance > max_variance {
            max_variance = between_variance;
            best_threshold = t as u8;
        }
    }

    best_threshold
}

/// Fraction of non-zero pixels of `mask` inside the given rectangle.
pub fn ink_density(mask: &GrayImage, x: u32, y: u32, width: u32, height: u32) -> f64 {
    let x_end = (x + width).min(mask.width());
    let y_end = (y + height).min(mask.height());
    if x_end <= x || y_end <= y {
        return 0.0;
    }
    let mut ink = 0u64;
    for yy in y..y_end {
        for xx in x..x_end {
            if mask.get_pixel(xx, yy).0[0] > 0 {
                ink += 1;
            }
        }
    }
    ink as f64 / ((x_end - x) as u64 * (y_end - y) as u64) as f64
}

// -- Integral image -----------------------------------------------------------

/// Summed-area table with a zero-padded first row and column.
///
/// `table[y * (width + 1) + x]` is the sum of all pixels in `[0, x) x [0, y)`.
pub struct IntegralImage {
    width: u32,
    height: u32,
    table: Vec<u64>,
}

impl IntegralImage {
    pub fn new(gray: &GrayImage) -> Self {
        let (w, h) = gray.dimensions();
        let stride = (w + 1) as usize;
        let mut table = vec![0u64; stride * (h + 1) as usize];

        for y in 0..h {
            let mut row_sum = 0u64;
            for x in 0..w {
                row_sum += gray.get_pixel(x, y).0[0] as u64;
                let idx = (y + 1) as usize * stride + (x + 1) as usize;
                let above = y as usize * stride + (x + 1) as usize;
                table[idx] = row_sum + table[above];
            }
        }

        Self {
            width: w,
            height: h,
            table,
        }
    }

    /// Mean over the square of `radius` around `(cx, cy)`, clipped to the image.
    pub fn region_mean(&self, cx: u32, cy: u32, radius: u32) -> f64 {
        let stride = (self.width + 1) as usize;
        let x1 = cx.saturating_sub(radius) as usize;
        let y1 = cy.saturating_sub(radius) as usize;
        let x2 = ((cx + radius + 1) as usize).min(self.width as usize);
        let y2 = ((cy + radius + 1) as usize).min(self.height as usize);

        let area = ((x2 - x1) * (y2 - y1)) as f64;
        if area == 0.0 {
            return 128.0;
        }

        let sum = self.table[y2 * stride + x2] as f64 - self.table[y1 * stride + x2] as f64
            - self.table[y2 * stride + x1] as f64
            + self.table[y1 * stride + x1] as f64;

        sum / area
    }
}
