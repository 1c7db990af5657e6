// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Linear filters over `Plane`s and the Laplacian sharpness measure.

use image::GrayImage;
use imageproc::filter::{gaussian_blur_f32, laplacian_filter};

use super::plane::Plane;

/// Smallest sigma handed to the Gaussian; `imageproc` rejects zero.
const MIN_SIGMA: f32 = 0.1;

/// Gaussian blur with replicated borders, computed at `f32` precision.
pub fn gaussian_blur(plane: &Plane, sigma: f32) -> Plane {
    if plane.is_empty() {
        return plane.clone();
    }
    Plane::from_image(&gaussian_blur_f32(&plane.to_image(), sigma.max(MIN_SIGMA)))
}

/// 3x3 convolution with replicated borders. `kernel` is row-major.
pub fn convolve3x3(plane: &Plane, kernel: &[f32; 9]) -> Plane {
    Plane::from_fn(plane.width(), plane.height(), |x, y| {
        let mut acc = 0.0;
        for ky in 0..3i64 {
            for kx in 0..3i64 {
                acc += kernel[(ky * 3 + kx) as usize]
                    * plane.get_clamped(x as i64 + kx - 1, y as i64 + ky - 1);
            }
        }
        acc
    })
}

/// Square odd-sized 2-D convolution with symmetric borders.
pub fn convolve_symmetric(plane: &Plane, kernel: &[f32], size: usize) -> Plane {
    debug_assert_eq!(kernel.len(), size * size);
    let half = (size / 2) as i64;
    Plane::from_fn(plane.width(), plane.height(), |x, y| {
        let mut acc = 0.0;
        for ky in 0..size {
            for kx in 0..size {
                acc += kernel[ky * size + kx]
                    * plane.get_symmetric(
                        x as i64 + kx as i64 - half,
                        y as i64 + ky as i64 - half,
                    );
            }
        }
        acc
    })
}

/// Variance of the 4-neighbour discrete Laplacian over interior pixels.
///
/// Higher is sharper. Scanned text is typically well above 100; motion- or
/// focus-blurred captures fall far below.
pub fn sharpness(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }
    let laplacian = laplacian_filter(gray);
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let lap = laplacian.get_pixel(x, y).0[0] as f64;
            sum += lap;
            sum_sq += lap * lap;
            count += 1;
        }
    }
    let mean = sum / count as f64;
    (sum_sq / count as f64 - mean * mean).max(0.0)
}

/// [`sharpness`] of a plane, quantized to 8 bits first.
pub fn laplacian_variance(plane: &Plane) -> f64 {
    sharpness(&plane.to_gray())
}

/// `(1 + amount) * plane - amount * blur(plane, sigma)`, unclamped.
pub fn unsharp_mask(plane: &Plane, sigma: f32, amount: f32) -> Plane {
    let blurred = gaussian_blur(plane, sigma);
    plane.zip_map(&blurred, |v, b| (1.0 + amount) * v - amount * b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn blur_preserves_constant_plane() {
        let plane = Plane::filled(20, 10, 77.0);
        let blurred = gaussian_blur(&plane, 3.0);
        assert!(blurred.data().iter().all(|&v| (v - 77.0).abs() < 1e-3));
    }

    #[test]
    fn blur_keeps_fractional_values() {
        let plane = Plane::from_fn(16, 1, |x, _| if x < 8 { 0.0 } else { 1.0 });
        let blurred = gaussian_blur(&plane, 1.0);
        let left = blurred.get(7, 0);
        let right = blurred.get(8, 0);
        assert!(left > 0.0 && left < 0.5, "left {left}");
        assert!(right > 0.5 && right < 1.0, "right {right}");
    }

    #[test]
    fn zero_sigma_does_not_panic() {
        let plane = Plane::from_fn(6, 6, |x, y| (x + y) as f32);
        let blurred = gaussian_blur(&plane, 0.0);
        assert!((blurred.get(3, 3) - plane.get(3, 3)).abs() < 1e-3);
    }

    #[test]
    fn checkerboard_is_sharper_than_its_blur() {
        let plane = Plane::from_fn(32, 32, |x, y| if (x / 2 + y / 2) % 2 == 0 { 0.0 } else { 255.0 });
        let sharp = laplacian_variance(&plane);
        let soft = laplacian_variance(&gaussian_blur(&plane, 2.0));
        assert!(sharp > 1000.0);
        assert!(soft < sharp / 10.0, "sharp={sharp} soft={soft}");
    }

    #[test]
    fn flat_and_tiny_images_have_zero_sharpness() {
        assert_eq!(laplacian_variance(&Plane::filled(2, 2, 9.0)), 0.0);
        assert_eq!(sharpness(&GrayImage::from_pixel(10, 10, Luma([128]))), 0.0);
    }

    #[test]
    fn single_dot_sharpness() {
        // Interior Laplacian is -4v at the dot, v at its four neighbours.
        let mut gray = GrayImage::new(5, 5);
        gray.put_pixel(2, 2, Luma([10]));
        let values = [-40.0f64, 10.0, 10.0, 10.0, 10.0, 0.0, 0.0, 0.0, 0.0];
        let mean = values.iter().sum::<f64>() / 9.0;
        let expected = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 9.0;
        assert!((sharpness(&gray) - expected).abs() < 1e-6);
    }

    #[test]
    fn identity_kernels_are_no_ops() {
        let plane = Plane::from_fn(9, 7, |x, y| (x * y) as f32);
        let id3 = [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(convolve3x3(&plane, &id3), plane);
        let mut id5 = vec![0.0; 25];
        id5[12] = 1.0;
        assert_eq!(convolve_symmetric(&plane, &id5, 5), plane);
    }

    #[test]
    fn unsharp_mask_steepens_an_edge() {
        let plane = Plane::from_fn(20, 4, |x, _| if x < 10 { 50.0 } else { 200.0 });
        let sharpened = unsharp_mask(&plane, 1.0, 0.5);
        assert!(sharpened.get(9, 2) < 50.0);
        assert!(sharpened.get(10, 2) > 200.0);
        assert!((sharpened.get(2, 2) - 50.0).abs() < 1e-3);
    }
}
