// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page — one rasterized document surface with its original and normalized
// pixel buffers and the metadata that outlives them.

use std::path::Path;

use image::RgbImage;
use podcheck_core::error::{PodError, Result};
use podcheck_core::{NormalizationReport, PageMetadata, QualityAssessment};
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use crate::normalize::Normalizer;
use crate::quality;
use crate::raster::ImageProcessor;
use crate::raster::filter::sharpness;

/// A decoded, normalized page owned by one pipeline invocation.
#[derive(Debug, Clone)]
pub struct Page {
    pub source: String,
    pub page_index: u32,
    /// The image as captured. Completeness is judged on this buffer.
    pub original: RgbImage,
    /// Output of the normalizer. Detectors and OCR work on this buffer.
    pub normalized: RgbImage,
    /// Laplacian variance of the original.
    pub sharpness: f64,
    pub is_blurry: bool,
    digest: String,
    normalization: NormalizationReport,
    quality: QualityAssessment,
}

impl Page {
    /// Decode encoded image bytes and normalize them.
    ///
    /// Undecodable data and zero-sized images are document-level failures.
    #[instrument(skip(bytes, normalizer), fields(len = bytes.len()))]
    pub fn from_bytes(
        bytes: &[u8],
        source: &str,
        page_index: u32,
        normalizer: &Normalizer,
        blur_threshold: f64,
    ) -> Result<Self> {
        let decoded = ImageProcessor::from_bytes(bytes)?.into_rgb8();
        let mut page = Self::from_image(decoded, source, page_index, normalizer, blur_threshold)?;
        page.digest = hex::encode(Sha256::digest(bytes));
        Ok(page)
    }

    /// Read and decode a file from disk.
    pub fn open(
        path: impl AsRef<Path>,
        page_index: u32,
        normalizer: &Normalizer,
        blur_threshold: f64,
    ) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes, &path.display().to_string(), page_index, normalizer, blur_threshold)
    }

    /// Wrap an already-decoded image. The digest is left empty.
    pub fn from_image(
        original: RgbImage,
        source: &str,
        page_index: u32,
        normalizer: &Normalizer,
        blur_threshold: f64,
    ) -> Result<Self> {
        if original.width() == 0 || original.height() == 0 {
            return Err(PodError::UnsupportedDocument(format!("{source}: image has no pixels")));
        }
        let sharpness = sharpness(&image::imageops::grayscale(&original));
        let is_blurry = sharpness < blur_threshold;
        let quality = quality::assess(&original);
        let normalized = normalizer.normalize_assessed(&original, &quality);
        info!(
            source,
            page_index,
            sharpness,
            is_blurry,
            quality = quality.overall_score,
            level = ?normalized.level,
            "Page prepared"
        );
        Ok(Self {
            source: source.to_string(),
            page_index,
            original,
            normalized: normalized.image,
            sharpness,
            is_blurry,
            digest: String::new(),
            normalization: normalized.report,
            quality,
        })
    }

    pub fn width(&self) -> u32 {
        self.normalized.width()
    }

    pub fn height(&self) -> u32 {
        self.normalized.height()
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn normalization(&self) -> &NormalizationReport {
        &self.normalization
    }

    pub fn quality(&self) -> &QualityAssessment {
        &self.quality
    }

    /// Metadata that persists in the result once the buffers are dropped.
    pub fn metadata(&self) -> PageMetadata {
        PageMetadata {
            source: self.source.clone(),
            page_index: self.page_index,
            width: self.original.width(),
            height: self.original.height(),
            sharpness: self.sharpness,
            is_blurry: self.is_blurry,
            digest: self.digest.clone(),
            normalization: self.normalization.clone(),
            quality: self.quality.clone(),
        }
    }
}
