// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decode, resize, rotate and encode single in-memory
// images using the `image` and `imageproc` crates.

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::geometric_transformations::{self, Interpolation};
use podcheck_core::error::PodError;
use tracing::{debug, info, instrument};

/// Image processing pipeline operating on a single in-memory image.
///
/// Each transformation consumes `self` and returns a new `ImageProcessor`
/// wrapping the transformed image, enabling method chaining.
///
/// ```ignore
/// let page = ImageProcessor::from_bytes(&bytes)?
///     .fit_longest_side(1000, 3000)
///     .rotate(-2.5)
///     .into_rgb8();
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Create a processor from raw encoded bytes (JPEG, PNG, TIFF, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, PodError> {
        let img = image::load_from_memory(data)
            .map_err(|err| PodError::ImageError(format!("failed to decode image: {}", err)))?;
        debug!(width = img.width(), height = img.height(), "Image decoded from bytes");
        Ok(Self { image: img })
    }

    pub fn from_rgb(image: RgbImage) -> Self {
        Self {
            image: DynamicImage::ImageRgb8(image),
        }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Consume the processor and return the image as 8-bit RGB.
    pub fn into_rgb8(self) -> RgbImage {
        match self.image {
            DynamicImage::ImageRgb8(rgb) => rgb,
            other => other.to_rgb8(),
        }
    }

    // -- Transformations (consume self, return new Self) ----------------------

    /// Resize to fit within `max_width` x `max_height`, preserving aspect ratio.
    #[instrument(skip(self), fields(max_width, max_height))]
    pub fn resize(self, max_width: u32, max_height: u32, filter: FilterType) -> Self {
        let resized = self.image.resize(max_width, max_height, filter);
        debug!(new_w = resized.width(), new_h = resized.height(), "Resize complete");
        Self { image: resized }
    }

    /// Scale so the longest side lies within `[min_side, max_side]`.
    ///
    /// Downscaling uses a Triangle filter (area-like averaging); upscaling uses
    /// Lanczos3. Images already inside the band are returned untouched.
    pub fn fit_longest_side(self, min_side: u32, max_side: u32) -> Self {
        let (w, h) = (self.width(), self.height());
        let longest = w.max(h);
        if longest == 0 {
            return self;
        }
        let (target, filter) = if longest > max_side {
            (max_side, FilterType::Triangle)
        } else if longest < min_side {
            (min_side, FilterType::Lanczos3)
        } else {
            return self;
        };
        let scale = target as f64 / longest as f64;
        let new_w = ((w as f64 * scale).round() as u32).max(1);
        let new_h = ((h as f64 * scale).round() as u32).max(1);
        info!(from_w = w, from_h = h, new_w, new_h, "Rescaling page");
        Self {
            image: self.image.resize_exact(new_w, new_h, filter),
        }
    }

    /// Scale both sides by `factor` with the given filter.
    pub fn scale(self, factor: f64, filter: FilterType) -> Self {
        let new_w = ((self.width() as f64 * factor).round() as u32).max(1);
        let new_h = ((self.height() as f64 * factor).round() as u32).max(1);
        Self {
            image: self.image.resize_exact(new_w, new_h, filter),
        }
    }

    /// Rotate by an arbitrary angle in degrees (clockwise), keeping the canvas
    /// size and filling uncovered corners with white paper.
    ///
    /// Multiples of 90 degrees use lossless rotation. Other angles use bicubic
    /// interpolation about the image centre.
    #[instrument(skip(self), fields(degrees))]
    pub fn rotate(self, degrees: f32) -> Self {
        let normalised = degrees.rem_euclid(360.0);
        if (normalised - 90.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate90(),
            };
        }
        if (normalised - 180.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate180(),
            };
        }
        if (normalised - 270.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate270(),
            };
        }
        if normalised.abs() < 0.01 || (normalised - 360.0).abs() < 0.01 {
            return self;
        }

        let rgb = self.into_rgb8();
        let rotated: RgbImage = geometric_transformations::rotate_about_center(
            &rgb,
            degrees.to_radians(),
            Interpolation::Bicubic,
            Rgb([255u8, 255, 255]),
        );
        debug!("General rotation applied");
        Self::from_rgb(rotated)
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, PodError> {
        encode_to_format(&self.image, ImageFormat::Png)
    }
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, PodError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, format)
        .map_err(|err| PodError::ImageError(format!("image encoding failed: {}", err)))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(w: u32, h: u32) -> ImageProcessor {
        ImageProcessor::from_rgb(RgbImage::from_pixel(w, h, Rgb([200, 200, 200])))
    }

    #[test]
    fn fit_longest_side_downscales_large_pages() {
        let out = blank(4000, 2000).fit_longest_side(1000, 3000);
        assert_eq!((out.width(), out.height()), (3000, 1500));
    }

    #[test]
    fn fit_longest_side_upscales_small_pages() {
        let out = blank(500, 250).fit_longest_side(1000, 3000);
        assert_eq!((out.width(), out.height()), (1000, 500));
    }

    #[test]
    fn fit_longest_side_leaves_band_untouched() {
        let out = blank(1200, 1600).fit_longest_side(1000, 3000);
        assert_eq!((out.width(), out.height()), (1200, 1600));
    }

    #[test]
    fn small_rotation_keeps_canvas() {
        let out = blank(40, 30).rotate(3.0);
        assert_eq!((out.width(), out.height()), (40, 30));
        let quarter = blank(40, 30).rotate(90.0);
        assert_eq!((quarter.width(), quarter.height()), (30, 40));
    }

    #[test]
    fn png_round_trip() {
        let bytes = blank(8, 6).to_png_bytes().unwrap();
        let back = ImageProcessor::from_bytes(&bytes).unwrap();
        assert_eq!((back.width(), back.height()), (8, 6));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = ImageProcessor::from_bytes(b"definitely not an image").err().unwrap();
        assert!(matches!(err, PodError::ImageError(_)));
    }
}
