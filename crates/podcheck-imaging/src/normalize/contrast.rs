// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contrast-limited adaptive histogram equalization (CLAHE) on a luma plane.
//
// Each tile of a `grid x grid` layout gets its own clipped histogram mapping;
// pixels blend the mappings of the four nearest tile centres bilinearly. In
// the adaptive variant every tile also picks its own clip limit from its
// brightness and spread, so dark, bright, flat and busy areas of one page are
// not all equalized the same way.

use crate::raster::Plane;
use crate::raster::plane::quantize;

/// How a tile's clip limit is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClipPolicy {
    Fixed(f32),
    /// Clip limit derived from tile mean and standard deviation.
    Adaptive,
}

/// Clip limit for a tile with the given intensity statistics.
pub fn adaptive_clip_limit(mean: f64, std_dev: f64) -> f32 {
    if mean < 80.0 {
        3.5
    } else if mean > 180.0 {
        2.5
    } else if std_dev < 20.0 {
        1.5
    } else if std_dev > 60.0 {
        2.0
    } else {
        2.5
    }
}

/// Equalize `luma` with a `grid x grid` tile layout.
pub fn clahe(luma: &Plane, grid: u32, policy: ClipPolicy) -> Plane {
    let (w, h) = (luma.width(), luma.height());
    if luma.is_empty() {
        return luma.clone();
    }
    let gx = grid.clamp(1, w);
    let gy = grid.clamp(1, h);

    let tile_bounds = |i: u32, n: u32, extent: u32| -> (u32, u32) {
        let start = (i as u64 * extent as u64 / n as u64) as u32;
        let end = ((i + 1) as u64 * extent as u64 / n as u64) as u32;
        (start, end.max(start + 1).min(extent))
    };

    let mut luts: Vec<[u8; 256]> = Vec::with_capacity((gx * gy) as usize);
    for ty in 0..gy {
        let (y0, y1) = tile_bounds(ty, gy, h);
        for tx in 0..gx {
            let (x0, x1) = tile_bounds(tx, gx, w);
            luts.push(tile_lut(luma, x0, x1, y0, y1, policy));
        }
    }

    let tile_w = w as f32 / gx as f32;
    let tile_h = h as f32 / gy as f32;
    Plane::from_fn(w, h, |x, y| {
        let v = quantize(luma.get(x, y)) as usize;
        let (i0, i1, ax) = neighbours((x as f32 + 0.5) / tile_w - 0.5, gx);
        let (j0, j1, ay) = neighbours((y as f32 + 0.5) / tile_h - 0.5, gy);
        let at = |i: u32, j: u32| luts[(j * gx + i) as usize][v] as f32;
        let top = at(i0, j0) * (1.0 - ax) + at(i1, j0) * ax;
        let bottom = at(i0, j1) * (1.0 - ax) + at(i1, j1) * ax;
        top * (1.0 - ay) + bottom * ay
    })
}

/// Indices of the two tiles around a fractional tile coordinate and the blend.
fn neighbours(f: f32, n: u32) -> (u32, u32, f32) {
    let max = (n - 1) as f32;
    let clamped = f.clamp(0.0, max);
    let i0 = clamped.floor() as u32;
    let i1 = (i0 + 1).min(n - 1);
    (i0, i1, clamped - i0 as f32)
}

fn tile_lut(luma: &Plane, x0: u32, x1: u32, y0: u32, y1: u32, policy: ClipPolicy) -> [u8; 256] {
    let mut histogram = [0u32; 256];
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for y in y0..y1 {
        for x in x0..x1 {
            let v = quantize(luma.get(x, y));
            histogram[v as usize] += 1;
            sum += v as f64;
            sum_sq += (v as f64).powi(2);
        }
    }
    let count = ((x1 - x0) * (y1 - y0)) as f64;
    let clip_limit = match policy {
        ClipPolicy::Fixed(limit) => limit,
        ClipPolicy::Adaptive => {
            let mean = sum / count;
            let std_dev = (sum_sq / count - mean * mean).max(0.0).sqrt();
            adaptive_clip_limit(mean, std_dev)
        }
    };

    // Clip and redistribute the excess evenly across all bins.
    let clip = ((clip_limit as f64 * count / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for bin in histogram.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }
    let share = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in histogram.iter_mut().enumerate() {
        *bin += share + u32::from(i < remainder);
    }

    let mut lut = [0u8; 256];
    let mut cdf = 0u64;
    for (i, &bin) in histogram.iter().enumerate() {
        cdf += bin as u64;
        lut[i] = ((cdf as f64 * 255.0 / count).round()).min(255.0) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_limit_profiles() {
        assert_eq!(adaptive_clip_limit(50.0, 40.0), 3.5);
        assert_eq!(adaptive_clip_limit(200.0, 5.0), 2.5);
        assert_eq!(adaptive_clip_limit(120.0, 10.0), 1.5);
        assert_eq!(adaptive_clip_limit(120.0, 70.0), 2.0);
        assert_eq!(adaptive_clip_limit(120.0, 40.0), 2.5);
    }

    #[test]
    fn low_contrast_gradient_is_stretched() {
        let plane = Plane::from_fn(64, 64, |x, _| 100.0 + (x as f32) * 0.5);
        let out = clahe(&plane, 4, ClipPolicy::Fixed(40.0));
        assert!(out.std_dev() > plane.std_dev(), "{} vs {}", out.std_dev(), plane.std_dev());
    }

    #[test]
    fn output_stays_in_range_and_size() {
        let plane = Plane::from_fn(37, 23, |x, y| ((x * 13 + y * 7) % 256) as f32);
        let out = clahe(&plane, 8, ClipPolicy::Adaptive);
        assert_eq!((out.width(), out.height()), (37, 23));
        assert!(out.data().iter().all(|&v| (0.0..=255.0).contains(&v)));
    }

    #[test]
    fn grid_larger_than_image_is_tolerated() {
        let plane = Plane::filled(3, 2, 128.0);
        let out = clahe(&plane, 8, ClipPolicy::Adaptive);
        assert_eq!((out.width(), out.height()), (3, 2));
    }
}
