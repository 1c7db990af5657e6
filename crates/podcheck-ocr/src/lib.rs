// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// podcheck-ocr — OCR backends and multi-engine consensus.
//
// Provides the `OcrBackend` trait, a Tesseract CLI backend, the pure-Rust
// `ocrs` backend (behind the `ocr` feature), similarity-weighted consensus
// over any set of backends, and a checkout pool for batch workers.

pub mod backend;
pub mod consensus;
pub mod factory;
#[cfg(feature = "ocr")]
pub mod ocrs_backend;
pub mod pool;
pub mod similarity;
pub mod tesseract;

pub use backend::{OcrBackend, RecognizedText, Word};
pub use consensus::{ConsensusEngine, ConsensusText, EngineOutput, PairAgreement};
pub use factory::{build_backend, engine_from_settings};
pub use pool::{EnginePool, PoolStats, PooledEngine};
pub use tesseract::TesseractCliBackend;

#[cfg(feature = "ocr")]
pub use ocrs_backend::OcrsBackend;
