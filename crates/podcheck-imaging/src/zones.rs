// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Zone extraction: crop configured fractional regions from a page.

use std::collections::BTreeMap;

use image::RgbImage;
use image::imageops;
use podcheck_core::BoundingBox;
use podcheck_core::config::Zone;
use tracing::debug;

/// One cropped zone together with where it sits on the page.
#[derive(Debug, Clone)]
pub struct ZoneImage {
    pub name: String,
    /// Pixel bounds in page coordinates.
    pub bounds: BoundingBox,
    pub image: RgbImage,
}

/// Crop every zone from `page`, in zone-name order.
///
/// Bounds are recomputed against the page's current size, so zones follow
/// the page through any resizing done by the normalizer.
pub fn extract_zones(page: &RgbImage, zones: &BTreeMap<String, Zone>) -> Vec<ZoneImage> {
    let (w, h) = page.dimensions();
    zones
        .iter()
        .map(|(name, zone)| {
            let (x0, y0, x1, y1) = zone.pixel_bounds(w, h);
            let bounds = BoundingBox::new(x0, y0, x1 - x0, y1 - y0);
            debug!(zone = %name, ?bounds, "Zone cropped");
            ZoneImage {
                name: name.clone(),
                bounds,
                image: crop(page, bounds),
            }
        })
        .collect()
}

/// Copy out a region, clamped to the image.
pub fn crop(image: &RgbImage, bbox: BoundingBox) -> RgbImage {
    let x = bbox.x.min(image.width());
    let y = bbox.y.min(image.height());
    let width = bbox.width.min(image.width() - x);
    let height = bbox.height.min(image.height() - y);
    imageops::crop_imm(image, x, y, width, height).to_image()
}
