// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image normalizer — runs the enhancement stages enabled by the configured
// level, in a fixed order, recording an explicit outcome for every stage.
//
// A stage that fails leaves its input untouched and is reported as degraded;
// normalization as a whole never fails.

pub mod contrast;
pub mod denoise;
pub mod geometry;
pub mod restore;
pub mod tone;

use std::panic::{self, AssertUnwindSafe};

use image::RgbImage;
use podcheck_core::config::{EnhancementLevel, NormalizerConfig};
use podcheck_core::error::{PodError, Result};
use podcheck_core::{NormalizationReport, QualityAssessment, StageKind, StageReport, StageStatus};
use tracing::{debug, info, instrument, warn};

use crate::quality;
use crate::raster::filter::laplacian_variance;
use crate::raster::plane::{LumaChroma, map_luma};
use crate::raster::ImageProcessor;

use self::contrast::ClipPolicy;

/// Output of one normalization run.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub image: RgbImage,
    /// The concrete level used (`Auto` is resolved before any stage runs).
    pub level: EnhancementLevel,
    pub report: NormalizationReport,
}

/// Stage driver configured once and shared across pages.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize `image`, assessing capture quality first if the level is `Auto`.
    pub fn normalize(&self, image: &RgbImage) -> Normalized {
        let level = match self.config.level {
            EnhancementLevel::Auto => {
                let assessment = quality::assess(image);
                EnhancementLevel::for_quality_score(assessment.overall_score)
            }
            level => level,
        };
        self.run(image, level)
    }

    /// Normalize using an assessment the caller already holds.
    pub fn normalize_assessed(&self, image: &RgbImage, assessment: &QualityAssessment) -> Normalized {
        let level = match self.config.level {
            EnhancementLevel::Auto => EnhancementLevel::for_quality_score(assessment.overall_score),
            level => level,
        };
        self.run(image, level)
    }

    #[instrument(skip(self, image), fields(width = image.width(), height = image.height(), ?level))]
    fn run(&self, image: &RgbImage, level: EnhancementLevel) -> Normalized {
        let (sharpness_before, contrast_before) = luma_metrics(image);
        let mut current = image.clone();
        let mut stages = Vec::with_capacity(StageKind::PIPELINE.len());

        for stage in StageKind::PIPELINE {
            if !level.enables(stage) {
                stages.push(StageReport {
                    stage,
                    status: StageStatus::Skipped,
                });
                continue;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_stage(stage, &current)))
                .unwrap_or_else(|_| Err(PodError::stage(stage.as_str(), "stage panicked")));
            let status = match outcome {
                Ok(Some(next)) if next.width() > 0 && next.height() > 0 => {
                    debug!(stage = stage.as_str(), width = next.width(), height = next.height(), "Stage applied");
                    current = next;
                    StageStatus::Applied
                }
                Ok(Some(_)) => {
                    warn!(stage = stage.as_str(), "Stage produced an empty image; keeping its input");
                    StageStatus::Degraded {
                        reason: "stage produced an empty image".into(),
                    }
                }
                Ok(None) => StageStatus::Skipped,
                Err(err) => {
                    warn!(stage = stage.as_str(), error = %err, "Stage failed; keeping its input");
                    StageStatus::Degraded {
                        reason: err.to_string(),
                    }
                }
            };
            stages.push(StageReport { stage, status });
        }

        let (sharpness_after, contrast_after) = luma_metrics(&current);
        info!(
            sharpness_before,
            sharpness_after,
            contrast_before,
            contrast_after,
            "Normalization complete"
        );
        Normalized {
            image: current,
            level,
            report: NormalizationReport {
                stages,
                sharpness_before,
                sharpness_after,
                contrast_before,
                contrast_after,
            },
        }
    }

    /// Run one stage. `Ok(None)` means its trigger condition did not hold.
    fn run_stage(&self, stage: StageKind, image: &RgbImage) -> Result<Option<RgbImage>> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PodError::stage(stage.as_str(), "empty image"));
        }
        let cfg = &self.config;
        let out = match stage {
            StageKind::Orientation => geometry::correct_orientation(image),
            StageKind::Resize => {
                let longest = image.width().max(image.height());
                if (cfg.min_dimension..=cfg.max_dimension).contains(&longest) {
                    None
                } else {
                    Some(
                        ImageProcessor::from_rgb(image.clone())
                            .fit_longest_side(cfg.min_dimension, cfg.max_dimension)
                            .into_rgb8(),
                    )
                }
            }
            StageKind::Contrast => Some(map_luma(image, |luma| {
                contrast::clahe(luma, cfg.clahe_grid, ClipPolicy::Adaptive)
            })),
            StageKind::Denoise => Some(self.denoise(image)),
            StageKind::Illumination => Some(map_luma(image, |luma| {
                tone::flatten_illumination(luma, tone::ILLUMINATION_SIGMA)
            })),
            StageKind::Sharpen => Some(map_luma(image, |luma| tone::sharpen_blend(luma, cfg.sharpen_mix))),
            StageKind::Deblur => {
                let (sharpness, _) = luma_metrics(image);
                if sharpness >= cfg.deblur_threshold {
                    debug!(sharpness, threshold = cfg.deblur_threshold, "Page sharp enough; no deblur");
                    None
                } else {
                    let restored = restore::deblur(image, cfg.deblur_iterations);
                    Some(self.denoise(&restored))
                }
            }
            StageKind::Perspective => geometry::correct_perspective(image),
            StageKind::SuperResolution => {
                let longest = image.width().max(image.height());
                (longest < cfg.super_resolution_below).then(|| restore::super_resolve(image))
            }
        };
        Ok(out)
    }

    fn denoise(&self, image: &RgbImage) -> RgbImage {
        let cfg = &self.config;
        map_luma(image, |luma| {
            denoise::non_local_means(
                luma,
                cfg.denoise_strength,
                cfg.denoise_patch_radius,
                cfg.denoise_search_radius,
            )
        })
    }
}

/// Laplacian variance and standard deviation of the luma channel.
fn luma_metrics(image: &RgbImage) -> (f64, f64) {
    let luma = LumaChroma::from_rgb(image).luma;
    (laplacian_variance(&luma), luma.std_dev())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn config(level: EnhancementLevel) -> NormalizerConfig {
        NormalizerConfig {
            level,
            max_dimension: 400,
            min_dimension: 100,
            denoise_search_radius: 2,
            denoise_patch_radius: 1,
            ..NormalizerConfig::default()
        }
    }

    fn text_like_page(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            let ink = y % 20 < 3 && x % 17 < 12 && x > 10 && x + 10 < w;
            if ink { Rgb([30, 30, 40]) } else { Rgb([225, 222, 215]) }
        })
    }

    #[test]
    fn every_stage_gets_a_report_in_pipeline_order() {
        let out = Normalizer::new(config(EnhancementLevel::High)).normalize(&text_like_page(200, 150));
        let order: Vec<StageKind> = out.report.stages.iter().map(|r| r.stage).collect();
        assert_eq!(order, StageKind::PIPELINE.to_vec());
        assert_eq!(out.report.status_of(StageKind::Deblur), Some(&StageStatus::Skipped));
        assert_eq!(out.report.status_of(StageKind::Contrast), Some(&StageStatus::Applied));
        assert_eq!(out.report.degraded().count(), 0);
    }

    #[test]
    fn basic_level_runs_only_its_stages() {
        let out = Normalizer::new(config(EnhancementLevel::Basic)).normalize(&text_like_page(200, 150));
        for stage in [StageKind::Orientation, StageKind::Denoise, StageKind::Illumination] {
            assert_eq!(out.report.status_of(stage), Some(&StageStatus::Skipped));
        }
        assert_eq!(out.report.status_of(StageKind::Sharpen), Some(&StageStatus::Applied));
    }

    #[test]
    fn resize_brings_small_pages_into_band() {
        let out = Normalizer::new(config(EnhancementLevel::Basic)).normalize(&text_like_page(60, 40));
        assert_eq!((out.image.width(), out.image.height()), (100, 67));
        assert_eq!(out.report.status_of(StageKind::Resize), Some(&StageStatus::Applied));
    }

    #[test]
    fn empty_image_degrades_instead_of_failing() {
        let out = Normalizer::new(config(EnhancementLevel::High)).normalize(&RgbImage::new(0, 0));
        assert_eq!((out.image.width(), out.image.height()), (0, 0));
        assert!(out.report.degraded().count() > 0);
    }

    #[test]
    fn auto_level_is_resolved() {
        let out = Normalizer::new(config(EnhancementLevel::Auto)).normalize(&text_like_page(200, 150));
        assert_ne!(out.level, EnhancementLevel::Auto);
    }

    #[test]
    fn ultra_restores_a_blurred_small_page() {
        let blurred = imageproc::filter::gaussian_blur_f32(&text_like_page(200, 150), 6.0);
        let normalizer = Normalizer::new(NormalizerConfig {
            // Keep the page soft until the deblur check.
            sharpen_mix: 0.0,
            ..config(EnhancementLevel::Ultra)
        });
        let out = normalizer.normalize(&blurred);
        assert_eq!(out.level, EnhancementLevel::Ultra);
        assert!(out.report.sharpness_before < 100.0, "{}", out.report.sharpness_before);
        assert_eq!(out.report.status_of(StageKind::Deblur), Some(&StageStatus::Applied));
        assert_eq!(out.report.status_of(StageKind::SuperResolution), Some(&StageStatus::Applied));
        assert!(matches!(
            out.report.status_of(StageKind::Perspective),
            Some(StageStatus::Applied | StageStatus::Skipped)
        ));
        assert_eq!(out.report.degraded().count(), 0);
    }

    #[test]
    fn ultra_leaves_a_sharp_large_page_alone() {
        let normalizer = Normalizer::new(NormalizerConfig {
            super_resolution_below: 300,
            ..config(EnhancementLevel::Ultra)
        });
        let out = normalizer.normalize(&text_like_page(400, 300));
        assert_eq!(out.report.stages.len(), StageKind::PIPELINE.len());
        assert_eq!(out.report.status_of(StageKind::Deblur), Some(&StageStatus::Skipped));
        assert_eq!(out.report.status_of(StageKind::SuperResolution), Some(&StageStatus::Skipped));
        assert!(matches!(
            out.report.status_of(StageKind::Perspective),
            Some(StageStatus::Applied | StageStatus::Skipped)
        ));
        assert_eq!(out.report.degraded().count(), 0);
        assert!(out.image.width().max(out.image.height()) <= 400);
    }

    #[test]
    fn normalization_is_deterministic() {
        let normalizer = Normalizer::new(config(EnhancementLevel::High));
        let page = text_like_page(180, 120);
        assert_eq!(normalizer.normalize(&page).image, normalizer.normalize(&page).image);
    }
}
