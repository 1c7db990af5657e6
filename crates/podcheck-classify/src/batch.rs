// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch runner: classify many documents on a bounded worker pool.
//
// Each worker checks an OCR engine out of the shared pool for the duration
// of one document. A document that cannot be read is recorded as a failure
// and the rest of the batch continues. Results come back in input order.

use std::path::{Path, PathBuf};

use podcheck_core::config::BatchConfig;
use podcheck_core::error::{PodError, Result};
use podcheck_core::ClassificationResult;
use podcheck_ocr::EnginePool;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::pipeline::Pipeline;

/// A document that could not be classified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub source: String,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
    pub results: Vec<ClassificationResult>,
    pub failures: Vec<BatchFailure>,
}

/// Files in `dir` (not recursive) whose extension the batch settings accept,
/// sorted by path.
pub fn discover(dir: impl AsRef<Path>, batch: &BatchConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if path.is_file() && batch.accepts(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Classify `paths` using `workers` threads (zero: one per core).
#[instrument(skip(pipeline, paths, pool), fields(documents = paths.len()))]
pub fn run(pipeline: &Pipeline, paths: &[PathBuf], pool: &EnginePool, workers: usize) -> Result<BatchOutcome> {
    let threads = BatchConfig {
        workers,
        ..BatchConfig::default()
    }
    .effective_workers();
    let executor = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("podcheck-worker-{i}"))
        .build()
        .map_err(|e| PodError::Pool(e.to_string()))?;

    info!(threads, "Starting batch");
    let processed: Vec<Result<ClassificationResult>> = executor.install(|| {
        paths
            .par_iter()
            .map(|path| {
                let engine = pool.acquire()?;
                pipeline.process_file(path, &engine)
            })
            .collect()
    });

    let mut outcome = BatchOutcome::default();
    for (path, result) in paths.iter().zip(processed) {
        match result {
            Ok(result) => outcome.results.push(result),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping document");
                outcome.failures.push(BatchFailure {
                    source: path.display().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        classified = outcome.results.len(),
        failed = outcome.failures.len(),
        stats = ?pool.stats(),
        "Batch finished"
    );
    Ok(outcome)
}

/// Discover and classify every accepted file in `dir`, using the pipeline's
/// batch settings.
pub fn run_directory(pipeline: &Pipeline, dir: impl AsRef<Path>, pool: &EnginePool) -> Result<BatchOutcome> {
    let batch = &pipeline.config().batch;
    let paths = discover(dir, batch)?;
    run(pipeline, &paths, pool, batch.workers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use podcheck_core::config::{ConsensusMethod, EnhancementLevel, NormalizerConfig, PodConfig};
    use podcheck_core::ClassificationCode;
    use podcheck_ocr::{ConsensusEngine, OcrBackend, RecognizedText};
    use std::sync::Arc;

    struct FixedBackend;

    impl OcrBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        fn recognize(&self, _image: &image::DynamicImage) -> Result<RecognizedText> {
            Ok(RecognizedText::new("Factura 1 Cliente 2 Pedido 3", 0.9))
        }
    }

    fn pipeline() -> Pipeline {
        let mut config = PodConfig::default();
        config.normalizer = NormalizerConfig {
            level: EnhancementLevel::Basic,
            min_dimension: 50,
            ..NormalizerConfig::default()
        };
        Pipeline::new(config).unwrap()
    }

    fn pool() -> EnginePool {
        EnginePool::shared(
            2,
            ConsensusEngine::new(vec![Arc::new(FixedBackend)], ConsensusMethod::Voting),
        )
    }

    fn write_blank(path: &Path) {
        RgbImage::from_pixel(120, 90, Rgb([255, 255, 255])).save(path).unwrap();
    }

    #[test]
    fn discover_filters_by_extension_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.JPG", "notes.txt", "c.tiff"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let found: Vec<_> = discover(dir.path(), &BatchConfig::default())
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(found, vec!["a.JPG", "b.png", "c.tiff"]);
    }

    #[test]
    fn unreadable_documents_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_blank(&dir.path().join("01.png"));
        std::fs::write(dir.path().join("02.png"), b"garbage").unwrap();
        write_blank(&dir.path().join("03.png"));

        let outcome = run_directory(&pipeline(), dir.path(), &pool()).unwrap();
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].source.ends_with("02.png"));
        assert!(outcome.results[0].page.source.ends_with("01.png"));
        assert!(outcome.results[1].page.source.ends_with("03.png"));
        // Blank white captures have no border detail.
        assert!(outcome
            .results
            .iter()
            .all(|r| r.classification_code == ClassificationCode::Incomplete));
    }

    #[test]
    fn results_keep_input_order_across_workers() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..6).map(|i| dir.path().join(format!("{i:02}.png"))).collect();
        for path in &paths {
            write_blank(path);
        }
        let outcome = run(&pipeline(), &paths, &pool(), 3).unwrap();
        let sources: Vec<_> = outcome.results.iter().map(|r| r.page.source.clone()).collect();
        let expected: Vec<_> = paths.iter().map(|p| p.display().to_string()).collect();
        assert_eq!(sources, expected);
    }

    #[test]
    fn empty_directory_is_an_empty_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run_directory(&pipeline(), dir.path(), &pool()).unwrap();
        assert!(outcome.results.is_empty());
        assert!(outcome.failures.is_empty());
    }
}
