// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the podcheck-imaging normalizer and its most
// expensive individual stages on a synthetic delivery-note page.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{Rgb, RgbImage};

use podcheck_core::config::{EnhancementLevel, NormalizerConfig};
use podcheck_imaging::normalize::contrast::{ClipPolicy, clahe};
use podcheck_imaging::normalize::denoise::non_local_means;
use podcheck_imaging::normalize::geometry::correct_perspective;
use podcheck_imaging::raster::Plane;
use podcheck_imaging::{Normalizer, quality};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A 400x300 page: ruled "text" lines on slightly warm paper, with a dark
/// band along the top as a stand-in for a shadow.
fn synthetic_page() -> RgbImage {
    RgbImage::from_fn(400, 300, |x, y| {
        let ink = y % 18 < 3 && x % 15 < 10 && x > 20 && x < 380;
        let shade = if y < 40 { 60 } else { 0 };
        if ink {
            Rgb([25, 25, 35])
        } else {
            Rgb([230 - shade, 226 - shade, 218 - shade])
        }
    })
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Full normalization at the default and the most aggressive level.
fn bench_normalize(c: &mut Criterion) {
    let page = synthetic_page();
    let mut group = c.benchmark_group("normalize (400x300)");
    for level in [EnhancementLevel::High, EnhancementLevel::Ultra] {
        let normalizer = Normalizer::new(NormalizerConfig {
            level,
            min_dimension: 200,
            max_dimension: 800,
            ..NormalizerConfig::default()
        });
        group.bench_function(format!("{level:?}"), |b| {
            b.iter(|| black_box(normalizer.normalize(black_box(&page))));
        });
    }
    group.finish();
}

/// Stage-level costs on the luma plane.
fn bench_stages(c: &mut Criterion) {
    let page = synthetic_page();
    let luma = Plane::from_gray(&image::imageops::grayscale(&page));

    c.bench_function("clahe adaptive (8x8 grid)", |b| {
        b.iter(|| black_box(clahe(black_box(&luma), 8, ClipPolicy::Adaptive)));
    });
    c.bench_function("non_local_means (h=10, 7x7 patch, 11x11 search)", |b| {
        b.iter(|| black_box(non_local_means(black_box(&luma), 10.0, 3, 5)));
    });
    c.bench_function("perspective_correction (no outline)", |b| {
        b.iter(|| black_box(correct_perspective(black_box(&page))));
    });
    c.bench_function("quality_assessment", |b| {
        b.iter(|| black_box(quality::assess(black_box(&page))));
    });
}

criterion_group!(benches, bench_normalize, bench_stages);
criterion_main!(benches);
