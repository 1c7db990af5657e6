// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Non-local means denoising.
//
// Every pixel becomes a weighted mean of the pixels in its search window,
// weighted by how similar their surrounding patches are. Patch distances for
// one search offset are read from a summed-area table of squared differences,
// so the cost is O(search^2) per pixel instead of O(search^2 * patch^2).

use crate::raster::Plane;

/// Denoise `plane` with filter strength `h` (larger removes more).
pub fn non_local_means(plane: &Plane, h: f32, patch_radius: u32, search_radius: u32) -> Plane {
    let (w, hgt) = (plane.width(), plane.height());
    if plane.is_empty() || h <= 0.0 {
        return plane.clone();
    }
    let (wu, hu) = (w as usize, hgt as usize);
    let n = wu * hu;
    let inv_h2 = 1.0 / (h * h);
    let pr = patch_radius as i64;
    let sr = search_radius as i64;

    let mut weight_sum = vec![0.0f32; n];
    let mut value_sum = vec![0.0f32; n];
    let mut table = vec![0.0f64; (wu + 1) * (hu + 1)];

    for dy in -sr..=sr {
        for dx in -sr..=sr {
            // Summed-area table of (I(p) - I(p + d))^2.
            let stride = wu + 1;
            for y in 0..hu {
                let mut row = 0.0f64;
                for x in 0..wu {
                    let a = plane.get(x as u32, y as u32);
                    let b = plane.get_clamped(x as i64 + dx, y as i64 + dy);
                    row += ((a - b) * (a - b)) as f64;
                    table[(y + 1) * stride + x + 1] = row + table[y * stride + x + 1];
                }
            }

            for y in 0..hu {
                let y0 = (y as i64 - pr).max(0) as usize;
                let y1 = ((y as i64 + pr + 1) as usize).min(hu);
                for x in 0..wu {
                    let x0 = (x as i64 - pr).max(0) as usize;
                    let x1 = ((x as i64 + pr + 1) as usize).min(wu);
                    let area = ((x1 - x0) * (y1 - y0)) as f64;
                    let ssd = table[y1 * stride + x1] - table[y0 * stride + x1]
                        - table[y1 * stride + x0]
                        + table[y0 * stride + x0];
                    let distance = (ssd / area) as f32;
                    let weight = (-distance * inv_h2).exp();
                    let idx = y * wu + x;
                    weight_sum[idx] += weight;
                    value_sum[idx] += weight * plane.get_clamped(x as i64 + dx, y as i64 + dy);
                }
            }
        }
    }

    Plane::from_fn(w, hgt, |x, y| {
        let idx = y as usize * wu + x as usize;
        if weight_sum[idx] > 0.0 {
            value_sum[idx] / weight_sum[idx]
        } else {
            plane.get(x, y)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-noise so the test does not need an RNG crate.
    fn noisy_step() -> Plane {
        let mut state = 12345u32;
        Plane::from_fn(40, 40, |x, _| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let noise = ((state >> 16) % 21) as f32 - 10.0;
            (if x < 20 { 60.0 } else { 200.0 }) + noise
        })
    }

    fn region_std(plane: &Plane, x0: u32, x1: u32) -> f64 {
        let values: Vec<f64> = (0..plane.height())
            .flat_map(|y| (x0..x1).map(move |x| (x, y)))
            .map(|(x, y)| plane.get(x, y) as f64)
            .collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
    }

    #[test]
    fn flat_regions_get_smoother() {
        let noisy = noisy_step();
        let clean = non_local_means(&noisy, 10.0, 2, 4);
        assert!(region_std(&clean, 2, 16) < region_std(&noisy, 2, 16) * 0.7);
    }

    #[test]
    fn step_edge_survives() {
        let clean = non_local_means(&noisy_step(), 10.0, 2, 4);
        let left: f32 = (0..40).map(|y| clean.get(17, y)).sum::<f32>() / 40.0;
        let right: f32 = (0..40).map(|y| clean.get(22, y)).sum::<f32>() / 40.0;
        assert!(right - left > 120.0, "edge contrast {}", right - left);
    }

    #[test]
    fn zero_strength_is_identity() {
        let plane = noisy_step();
        assert_eq!(non_local_means(&plane, 0.0, 2, 4), plane);
    }
}
