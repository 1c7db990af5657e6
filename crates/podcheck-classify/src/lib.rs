// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// podcheck-classify — Rule-table classification and document orchestration.
//
// Provides the ordered classification rules, the single-document pipeline
// that wires normalization, OCR and the detectors together, a parallel batch
// runner, and aggregate summaries over batch results.

pub mod batch;
pub mod classifier;
pub mod pipeline;
pub mod rules;
pub mod summary;

pub use batch::{BatchFailure, BatchOutcome, discover, run, run_directory};
pub use classifier::Classifier;
pub use pipeline::Pipeline;
pub use rules::{Outcome, RULES, Rule, evaluate};
pub use summary::{ClassificationSummary, IssueCount};
