// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Floating-point single-channel planes and luminance/chroma separation.
//
// Restoration stages accumulate error badly in 8-bit buffers, so they work on
// `Plane`s and quantize once at the end.

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

/// A `Plane` laid out as an `image` buffer, for handing to `imageproc` filters.
pub type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// A row-major `f32` image with one channel, nominally on a 0–255 scale.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Plane {
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, 0.0)
    }

    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_gray(gray: &GrayImage) -> Self {
        Self {
            width: gray.width(),
            height: gray.height(),
            data: gray.as_raw().iter().map(|&v| v as f32).collect(),
        }
    }

    /// Quantize to 8 bits with rounding and saturation.
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([quantize(self.get(x, y))])
        })
    }

    pub fn to_image(&self) -> FloatImage {
        ImageBuffer::from_fn(self.width, self.height, |x, y| Luma([self.get(x, y)]))
    }

    pub fn from_image(image: &FloatImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: image.as_raw().clone(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        let idx = y as usize * self.width as usize + x as usize;
        self.data[idx] = value;
    }

    /// Sample with replicated borders.
    #[inline]
    pub fn get_clamped(&self, x: i64, y: i64) -> f32 {
        let cx = x.clamp(0, self.width as i64 - 1) as u32;
        let cy = y.clamp(0, self.height as i64 - 1) as u32;
        self.get(cx, cy)
    }

    /// Sample with symmetric (mirror-including-edge) borders.
    #[inline]
    pub fn get_symmetric(&self, x: i64, y: i64) -> f32 {
        self.get(
            reflect(x, self.width as i64) as u32,
            reflect(y, self.height as i64) as u32,
        )
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Plane {
        Plane {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Combine two planes of equal size element-wise.
    pub fn zip_map(&self, other: &Plane, f: impl Fn(f32, f32) -> f32) -> Plane {
        debug_assert_eq!((self.width, self.height), (other.width, other.height));
        Plane {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&v| v as f64).sum::<f64>() / self.data.len() as f64
    }

    pub fn variance(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        self.data
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / self.data.len() as f64
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

#[inline]
pub fn quantize(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Reflect an index into `[0, len)` using symmetric boundary extension.
#[inline]
fn reflect(mut i: i64, len: i64) -> i64 {
    if len == 1 {
        return 0;
    }
    let period = 2 * len;
    i = i.rem_euclid(period);
    if i >= len { period - 1 - i } else { i }
}

// -- Luminance / chroma -------------------------------------------------------

/// An RGB image split into full-range BT.601 luma and chroma planes.
///
/// Contrast, denoise, illumination and sharpening touch only `luma`, so hue
/// and saturation of stamps and coloured ink survive normalization.
#[derive(Debug, Clone)]
pub struct LumaChroma {
    pub luma: Plane,
    cb: Plane,
    cr: Plane,
}

impl LumaChroma {
    pub fn from_rgb(rgb: &RgbImage) -> Self {
        let (w, h) = rgb.dimensions();
        let mut luma = Plane::new(w, h);
        let mut cb = Plane::new(w, h);
        let mut cr = Plane::new(w, h);
        for (x, y, px) in rgb.enumerate_pixels() {
            let [r, g, b] = px.0.map(|c| c as f32);
            luma.set(x, y, 0.299 * r + 0.587 * g + 0.114 * b);
            cb.set(x, y, 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b);
            cr.set(x, y, 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b);
        }
        Self { luma, cb, cr }
    }

    /// Replace the luma plane, keeping chroma. Sizes must match.
    pub fn with_luma(self, luma: Plane) -> Self {
        debug_assert_eq!(
            (luma.width(), luma.height()),
            (self.cb.width(), self.cb.height())
        );
        Self { luma, ..self }
    }

    pub fn to_rgb(&self) -> RgbImage {
        RgbImage::from_fn(self.luma.width(), self.luma.height(), |x, y| {
            let yy = self.luma.get(x, y);
            let cb = self.cb.get(x, y) - 128.0;
            let cr = self.cr.get(x, y) - 128.0;
            Rgb([
                quantize(yy + 1.402 * cr),
                quantize(yy - 0.344_136 * cb - 0.714_136 * cr),
                quantize(yy + 1.772 * cb),
            ])
        })
    }
}

/// Run `f` on the luma channel of `rgb` and recombine with the original chroma.
pub fn map_luma(rgb: &RgbImage, f: impl FnOnce(&Plane) -> Plane) -> RgbImage {
    let split = LumaChroma::from_rgb(rgb);
    let luma = f(&split.luma);
    split.with_luma(luma).to_rgb()
}
