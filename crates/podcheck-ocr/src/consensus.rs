// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Multi-engine OCR consensus.
//
// Every backend runs independently over the same image. A backend that
// returns an error or panics is recorded as unsuccessful and ignored; the
// remaining outputs are reconciled by the configured method.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use image::DynamicImage;
use podcheck_core::config::ConsensusMethod;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::backend::{OcrBackend, RecognizedText, Word, sanitize};
use crate::similarity::similarity_ratio;

/// What one backend produced for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOutput {
    pub engine: String,
    pub success: bool,
    pub text: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub words: Vec<Word>,
}

/// Similarity ratio between two successful backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairAgreement {
    pub first: String,
    pub second: String,
    pub similarity: f64,
}

/// Reconciled text plus metadata about which backends agreed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusText {
    pub text: String,
    /// In [0, 1]. Zero when no backend succeeded.
    pub confidence: f64,
    pub method: ConsensusMethod,
    /// Voting only: similarity-weighted score of the chosen text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus: Option<f64>,
    /// Backend whose text was selected (voting and best).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    pub agreements: Vec<PairAgreement>,
    pub outputs: Vec<EngineOutput>,
}

impl ConsensusText {
    fn empty(method: ConsensusMethod, outputs: Vec<EngineOutput>) -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            method,
            consensus: None,
            winner: None,
            agreements: Vec::new(),
            outputs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn successful_engines(&self) -> usize {
        self.outputs.iter().filter(|o| o.success).count()
    }

    /// Token confidences behind the selected text, in [0, 1].
    ///
    /// Taken from the winning backend (or every successful one for `All`).
    /// Backends without token detail contribute their overall confidence.
    pub fn token_confidences(&self) -> Vec<f64> {
        let contributes = |o: &&EngineOutput| match &self.winner {
            Some(winner) => o.success && &o.engine == winner,
            None => o.success,
        };
        self.outputs
            .iter()
            .filter(contributes)
            .flat_map(|o| {
                if o.words.is_empty() {
                    vec![o.confidence]
                } else {
                    o.words.iter().map(|w| w.confidence).collect()
                }
            })
            .collect()
    }
}

/// Runs the configured backends and reconciles their outputs.
#[derive(Clone)]
pub struct ConsensusEngine {
    backends: Vec<Arc<dyn OcrBackend>>,
    method: ConsensusMethod,
}

impl std::fmt::Debug for ConsensusEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusEngine")
            .field("backends", &self.backend_names())
            .field("method", &self.method)
            .finish()
    }
}

impl ConsensusEngine {
    pub fn new(backends: Vec<Arc<dyn OcrBackend>>, method: ConsensusMethod) -> Self {
        Self { backends, method }
    }

    /// An engine with no backends. Every call yields empty text.
    pub fn disabled() -> Self {
        Self::new(Vec::new(), ConsensusMethod::default())
    }

    pub fn method(&self) -> ConsensusMethod {
        self.method
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn is_disabled(&self) -> bool {
        self.backends.is_empty()
    }

    /// Recognize `image` with every backend and combine by the configured method.
    #[instrument(skip_all, fields(width = image.width(), height = image.height(), method = ?self.method))]
    pub fn recognize(&self, image: &DynamicImage) -> ConsensusText {
        let outputs: Vec<EngineOutput> = self.backends.iter().map(|b| run_backend(b.as_ref(), image)).collect();
        let result = combine(self.method, outputs);
        info!(
            chars = result.text.len(),
            confidence = result.confidence,
            engines = result.successful_engines(),
            "OCR consensus complete"
        );
        result
    }
}

fn run_backend(backend: &dyn OcrBackend, image: &DynamicImage) -> EngineOutput {
    let name = backend.name().to_string();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| backend.recognize(image)));
    match outcome {
        Ok(Ok(RecognizedText { text, confidence, words })) => {
            debug!(engine = %name, chars = text.len(), confidence, "Backend succeeded");
            EngineOutput {
                engine: name,
                success: true,
                text: text.trim().to_string(),
                confidence: sanitize(confidence),
                error: None,
                words,
            }
        }
        Ok(Err(err)) => {
            warn!(engine = %name, error = %err, "OCR backend failed");
            failed(name, err.to_string())
        }
        Err(_) => {
            warn!(engine = %name, "OCR backend panicked");
            failed(name, "backend panicked".to_string())
        }
    }
}

fn failed(engine: String, error: String) -> EngineOutput {
    EngineOutput {
        engine,
        success: false,
        text: String::new(),
        confidence: 0.0,
        error: Some(error),
        words: Vec::new(),
    }
}

/// Reconcile backend outputs. Exposed for callers that run backends themselves.
pub fn combine(method: ConsensusMethod, outputs: Vec<EngineOutput>) -> ConsensusText {
    let successful: Vec<usize> = outputs
        .iter()
        .enumerate()
        .filter(|(_, o)| o.success)
        .map(|(i, _)| i)
        .collect();
    if successful.is_empty() {
        return ConsensusText::empty(method, outputs);
    }
    match method {
        ConsensusMethod::Voting => vote(&successful, outputs),
        ConsensusMethod::Best => best(&successful, outputs),
        ConsensusMethod::All => all(&successful, outputs),
    }
}

fn mean_confidence(successful: &[usize], outputs: &[EngineOutput]) -> f64 {
    successful.iter().map(|&i| outputs[i].confidence).sum::<f64>() / successful.len() as f64
}

/// Similarity-weighted voting.
///
/// Each candidate scores `mean similarity to the others * its confidence`.
/// The highest score wins; ties go to the higher confidence, then to the
/// backend listed first. A single successful backend wins with consensus 1.
fn vote(successful: &[usize], outputs: Vec<EngineOutput>) -> ConsensusText {
    let confidence = mean_confidence(successful, &outputs);
    if let [only] = successful {
        let winner = &outputs[*only];
        return ConsensusText {
            text: winner.text.clone(),
            confidence,
            method: ConsensusMethod::Voting,
            consensus: Some(1.0),
            winner: Some(winner.engine.clone()),
            agreements: Vec::new(),
            outputs,
        };
    }

    let n = successful.len();
    let mut matrix = vec![vec![0.0f64; n]; n];
    let mut agreements = Vec::with_capacity(n * (n - 1) / 2);
    for a in 0..n {
        for b in a + 1..n {
            let (oa, ob) = (&outputs[successful[a]], &outputs[successful[b]]);
            let similarity = similarity_ratio(&oa.text, &ob.text);
            matrix[a][b] = similarity;
            matrix[b][a] = similarity;
            agreements.push(PairAgreement {
                first: oa.engine.clone(),
                second: ob.engine.clone(),
                similarity,
            });
        }
    }

    let scores: Vec<f64> = (0..n)
        .map(|a| {
            let mean_similarity = (0..n).filter(|&b| b != a).map(|b| matrix[a][b]).sum::<f64>() / (n - 1) as f64;
            mean_similarity * outputs[successful[a]].confidence
        })
        .collect();
    let mut pick = 0;
    for a in 1..n {
        let (score, best_score) = (scores[a], scores[pick]);
        let conf = outputs[successful[a]].confidence;
        let best_conf = outputs[successful[pick]].confidence;
        if score > best_score || (score == best_score && conf > best_conf) {
            pick = a;
        }
    }
    let winner = &outputs[successful[pick]];
    debug!(engine = %winner.engine, score = scores[pick], "Voting winner");
    ConsensusText {
        text: winner.text.clone(),
        confidence,
        method: ConsensusMethod::Voting,
        consensus: Some(sanitize(scores[pick])),
        winner: Some(winner.engine.clone()),
        agreements,
        outputs,
    }
}

/// Highest-confidence backend wins; the first listed breaks ties.
fn best(successful: &[usize], outputs: Vec<EngineOutput>) -> ConsensusText {
    let mut pick = successful[0];
    for &i in &successful[1..] {
        if outputs[i].confidence > outputs[pick].confidence {
            pick = i;
        }
    }
    ConsensusText {
        text: outputs[pick].text.clone(),
        confidence: outputs[pick].confidence,
        method: ConsensusMethod::Best,
        consensus: None,
        winner: Some(outputs[pick].engine.clone()),
        agreements: Vec::new(),
        outputs,
    }
}

/// Every successful output, one `[engine]: text` line each.
fn all(successful: &[usize], outputs: Vec<EngineOutput>) -> ConsensusText {
    let text = successful
        .iter()
        .map(|&i| format!("[{}]: {}", outputs[i].engine, outputs[i].text))
        .collect::<Vec<_>>()
        .join("\n");
    ConsensusText {
        text,
        confidence: mean_confidence(successful, &outputs),
        method: ConsensusMethod::All,
        consensus: None,
        winner: None,
        agreements: Vec::new(),
        outputs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use podcheck_core::PodError;
    use podcheck_core::error::Result;

    struct Fixed(&'static str, &'static str, f64);

    impl OcrBackend for Fixed {
        fn name(&self) -> &str {
            self.0
        }
        fn recognize(&self, _image: &DynamicImage) -> Result<RecognizedText> {
            Ok(RecognizedText::new(self.1, self.2))
        }
    }

    struct Failing;

    impl OcrBackend for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn recognize(&self, _image: &DynamicImage) -> Result<RecognizedText> {
            Err(PodError::OcrError("engine offline".into()))
        }
    }

    struct Panicking;

    impl OcrBackend for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }
        fn recognize(&self, _image: &DynamicImage) -> Result<RecognizedText> {
            panic!("model crashed")
        }
    }

    fn image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(4, 4))
    }

    fn engine(method: ConsensusMethod, backends: Vec<Arc<dyn OcrBackend>>) -> ConsensusEngine {
        ConsensusEngine::new(backends, method)
    }

    #[test]
    fn voting_prefers_the_text_others_agree_with() {
        let result = engine(
            ConsensusMethod::Voting,
            vec![
                Arc::new(Fixed("a", "invoice 1234 received", 0.80)),
                Arc::new(Fixed("b", "invoice 1234 receivcd", 0.70)),
                Arc::new(Fixed("c", "xqz", 0.99)),
            ],
        )
        .recognize(&image());
        assert_eq!(result.text, "invoice 1234 received");
        assert_eq!(result.winner.as_deref(), Some("a"));
        assert!((result.confidence - (0.80 + 0.70 + 0.99) / 3.0).abs() < 1e-9);
        assert_eq!(result.agreements.len(), 3);
        let consensus = result.consensus.unwrap();
        assert!(consensus > 0.0 && consensus <= 1.0);
    }

    #[test]
    fn single_success_has_full_consensus() {
        let result = engine(
            ConsensusMethod::Voting,
            vec![Arc::new(Failing), Arc::new(Fixed("solo", "recibido", 0.6))],
        )
        .recognize(&image());
        assert_eq!(result.text, "recibido");
        assert_eq!(result.consensus, Some(1.0));
        assert!((result.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn failures_and_panics_are_isolated() {
        let result = engine(
            ConsensusMethod::Best,
            vec![
                Arc::new(Panicking),
                Arc::new(Failing),
                Arc::new(Fixed("ok", "pedido 77", 0.9)),
            ],
        )
        .recognize(&image());
        assert_eq!(result.text, "pedido 77");
        assert_eq!(result.successful_engines(), 1);
        assert_eq!(result.outputs[0].error.as_deref(), Some("backend panicked"));
        assert!(!result.outputs[1].success);
    }

    #[test]
    fn zero_successes_yield_empty_text_and_zero_confidence() {
        for method in [ConsensusMethod::Voting, ConsensusMethod::Best, ConsensusMethod::All] {
            let result = engine(method, vec![Arc::new(Failing)]).recognize(&image());
            assert!(result.is_empty());
            assert_eq!(result.confidence, 0.0);
        }
        let none = ConsensusEngine::disabled().recognize(&image());
        assert!(none.is_empty() && none.confidence == 0.0);
    }

    #[test]
    fn best_takes_highest_confidence() {
        let result = engine(
            ConsensusMethod::Best,
            vec![Arc::new(Fixed("low", "one", 0.4)), Arc::new(Fixed("high", "two", 0.8))],
        )
        .recognize(&image());
        assert_eq!(result.text, "two");
        assert_eq!(result.confidence, 0.8);
        assert_eq!(result.winner.as_deref(), Some("high"));
    }

    #[test]
    fn all_tags_every_output_by_source() {
        let result = engine(
            ConsensusMethod::All,
            vec![Arc::new(Fixed("x", "uno", 0.5)), Arc::new(Fixed("y", "dos", 0.7))],
        )
        .recognize(&image());
        assert_eq!(result.text, "[x]: uno\n[y]: dos");
        assert!((result.confidence - 0.6).abs() < 1e-9);
        assert_eq!(result.token_confidences(), vec![0.5, 0.7]);
    }

    #[test]
    fn voting_tie_goes_to_higher_confidence() {
        // Two disjoint texts: every similarity is zero, so all scores tie.
        let result = engine(
            ConsensusMethod::Voting,
            vec![Arc::new(Fixed("p", "abc", 0.3)), Arc::new(Fixed("q", "xyz", 0.9))],
        )
        .recognize(&image());
        assert_eq!(result.text, "xyz");
        assert_eq!(result.consensus, Some(0.0));
    }
}
