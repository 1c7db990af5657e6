// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Build backends and consensus engines from configuration.

use std::sync::Arc;

use podcheck_core::config::{BackendConfig, OcrSettings};
use podcheck_core::error::Result;
use tracing::info;

use crate::backend::OcrBackend;
use crate::consensus::ConsensusEngine;
use crate::tesseract::TesseractCliBackend;

/// Instantiate one backend from its descriptor.
pub fn build_backend(config: &BackendConfig) -> Result<Arc<dyn OcrBackend>> {
    match config {
        BackendConfig::Tesseract { binary, language, psm } => {
            Ok(Arc::new(TesseractCliBackend::new(binary.clone(), language.clone(), *psm)))
        }
        #[cfg(feature = "ocr")]
        BackendConfig::Ocrs {
            model_dir,
            nominal_confidence,
        } => Ok(Arc::new(crate::ocrs_backend::OcrsBackend::from_model_dir(
            model_dir,
            *nominal_confidence,
        )?)),
        #[cfg(not(feature = "ocr"))]
        BackendConfig::Ocrs { .. } => Err(podcheck_core::PodError::Config(
            "the `ocrs` backend requires building with the `ocr` feature".into(),
        )),
    }
}

/// Build a consensus engine over every configured backend.
///
/// An empty backend list yields a disabled engine that extracts no text.
pub fn engine_from_settings(settings: &OcrSettings) -> Result<ConsensusEngine> {
    let backends = settings
        .backends
        .iter()
        .map(build_backend)
        .collect::<Result<Vec<_>>>()?;
    let engine = ConsensusEngine::new(backends, settings.method);
    info!(backends = ?engine.backend_names(), method = ?settings.method, "OCR consensus engine ready");
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use podcheck_core::config::ConsensusMethod;

    #[test]
    fn tesseract_descriptor_builds() {
        let settings = OcrSettings {
            method: ConsensusMethod::Best,
            backends: vec![BackendConfig::Tesseract {
                binary: "tesseract".into(),
                language: "spa".into(),
                psm: 6,
            }],
        };
        let engine = engine_from_settings(&settings).unwrap();
        assert_eq!(engine.backend_names(), vec!["tesseract"]);
        assert_eq!(engine.method(), ConsensusMethod::Best);
    }

    #[test]
    fn no_backends_means_disabled_engine() {
        let engine = engine_from_settings(&OcrSettings::default()).unwrap();
        assert!(engine.is_disabled());
    }

    #[test]
    fn ocrs_without_models_fails() {
        let config = BackendConfig::Ocrs {
            model_dir: "/nonexistent/ocrs-models".into(),
            nominal_confidence: 0.85,
        };
        assert!(build_backend(&config).is_err());
    }
}
