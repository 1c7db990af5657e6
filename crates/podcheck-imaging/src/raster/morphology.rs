// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Grey-level morphology with rectangular and elliptical structuring elements.
//
// Elements are drawn into a small raster and handed to `imageproc` as a
// `Mask`; the operators themselves are `imageproc::morphology`'s. Samples
// falling outside the image do not take part.

use image::{GrayImage, Luma};
use imageproc::morphology::{Mask, grayscale_close, grayscale_dilate, grayscale_erode};

/// Largest side `imageproc` accepts for a mask image.
const MAX_SIDE: u32 = 511;

/// A flat structuring element anchored at `(width / 2, height / 2)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    width: u32,
    height: u32,
    mask: Mask,
}

impl StructuringElement {
    pub fn rect(width: u32, height: u32) -> Self {
        Self::from_fn(width, height, |_, _| true)
    }

    /// Ellipse inscribed in a `width x height` box.
    pub fn ellipse(width: u32, height: u32) -> Self {
        let rx = width.clamp(1, MAX_SIDE) as f64 / 2.0;
        let ry = height.clamp(1, MAX_SIDE) as f64 / 2.0;
        Self::from_fn(width, height, |i, j| {
            let dx = (i as f64 + 0.5 - rx) / rx;
            let dy = (j as f64 + 0.5 - ry) / ry;
            dx * dx + dy * dy <= 1.0
        })
    }

    fn from_fn(width: u32, height: u32, inside: impl Fn(u32, u32) -> bool) -> Self {
        let (width, height) = (width.clamp(1, MAX_SIDE), height.clamp(1, MAX_SIDE));
        let raster = GrayImage::from_fn(width, height, |x, y| Luma([if inside(x, y) { 255 } else { 0 }]));
        // Both halves are at most 255 after the clamp.
        let mask = Mask::from_image(&raster, (width / 2) as u8, (height / 2) as u8);
        Self { width, height, mask }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

pub fn dilate(image: &GrayImage, element: &StructuringElement) -> GrayImage {
    grayscale_dilate(image, &element.mask)
}

pub fn erode(image: &GrayImage, element: &StructuringElement) -> GrayImage {
    grayscale_erode(image, &element.mask)
}

/// Dilation followed by erosion. Bridges gaps narrower than the element.
pub fn close(image: &GrayImage, element: &StructuringElement) -> GrayImage {
    grayscale_close(image, &element.mask)
}

/// Repeated dilation.
pub fn dilate_n(image: &GrayImage, element: &StructuringElement, iterations: u32) -> GrayImage {
    let mut out = image.clone();
    for _ in 0..iterations {
        out = dilate(&out, element);
    }
    out
}

/// Pixel-wise maximum of two equally sized masks.
pub fn union(a: &GrayImage, b: &GrayImage) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        Luma([a.get_pixel(x, y).0[0].max(b.get_pixel(x, y).0[0])])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(w: u32, h: u32, at: (u32, u32)) -> GrayImage {
        let mut img = GrayImage::new(w, h);
        img.put_pixel(at.0, at.1, Luma([255]));
        img
    }

    fn count(img: &GrayImage) -> usize {
        img.pixels().filter(|p| p.0[0] > 0).count()
    }

    #[test]
    fn rect_dilation_grows_to_element_size() {
        let out = dilate(&dot(20, 20, (10, 10)), &StructuringElement::rect(3, 5));
        assert_eq!(count(&out), 15);
        assert_eq!(out.get_pixel(9, 8).0[0], 255);
        assert_eq!(out.get_pixel(11, 12).0[0], 255);
        assert_eq!(out.get_pixel(12, 10).0[0], 0);
    }

    #[test]
    fn horizontal_close_bridges_small_gaps() {
        let mut img = GrayImage::new(40, 5);
        for x in (0..40).filter(|x| x % 4 != 0) {
            img.put_pixel(x, 2, Luma([255]));
        }
        let closed = close(&img, &StructuringElement::rect(5, 1));
        for x in 2..38 {
            assert_eq!(closed.get_pixel(x, 2).0[0], 255, "gap at {x}");
        }
        assert_eq!(closed.get_pixel(10, 1).0[0], 0);
    }

    #[test]
    fn vertical_bar_closes_columns_only() {
        let mut img = GrayImage::new(5, 30);
        for y in (0..30).filter(|y| y % 3 != 0) {
            img.put_pixel(2, y, Luma([255]));
        }
        let closed = close(&img, &StructuringElement::rect(1, 20));
        assert!((10..20).all(|y| closed.get_pixel(2, y).0[0] == 255));
        assert!((0..30).all(|y| closed.get_pixel(1, y).0[0] == 0));
    }

    #[test]
    fn erosion_removes_isolated_pixels() {
        let out = erode(&dot(9, 9, (4, 4)), &StructuringElement::rect(3, 3));
        assert_eq!(count(&out), 0);
    }

    #[test]
    fn ellipse_is_rounder_than_rect() {
        let ellipse = StructuringElement::ellipse(5, 5);
        let grown = dilate(&dot(15, 15, (7, 7)), &ellipse);
        let n = count(&grown);
        assert!((13..25).contains(&n), "ellipse area {n}");
        assert_eq!(grown.get_pixel(5, 5).0[0], 0);
        assert_eq!(grown.get_pixel(7, 5).0[0], 255);
    }

    #[test]
    fn oversized_elements_are_clamped() {
        let element = StructuringElement::rect(0, 4000);
        assert_eq!((element.width(), element.height()), (1, MAX_SIDE));
    }

    #[test]
    fn repeated_dilation_accumulates() {
        let once = dilate_n(&dot(30, 30, (15, 15)), &StructuringElement::rect(3, 3), 1);
        let twice = dilate_n(&dot(30, 30, (15, 15)), &StructuringElement::rect(3, 3), 2);
        assert_eq!(count(&once), 9);
        assert_eq!(count(&twice), 25);
    }

    #[test]
    fn union_takes_maximum() {
        let u = union(&dot(4, 4, (0, 0)), &dot(4, 4, (3, 3)));
        assert_eq!(count(&u), 2);
    }
}
