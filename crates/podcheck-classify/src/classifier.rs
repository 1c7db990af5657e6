// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Turns detector output into the final, immutable classification result.

use std::collections::BTreeMap;

use podcheck_core::config::PodConfig;
use podcheck_core::{ClassificationCode, ClassificationResult, Confidence, DetectionDetails, Issue, PageMetadata};
use tracing::{info, warn};

use crate::rules;

/// Applies the rule table and attaches configured labels.
#[derive(Debug, Clone)]
pub struct Classifier {
    labels: BTreeMap<ClassificationCode, String>,
}

impl Classifier {
    pub fn new(config: &PodConfig) -> Self {
        let labels = ClassificationCode::ALL
            .into_iter()
            .map(|code| (code, config.label(code)))
            .collect();
        Self { labels }
    }

    pub fn label(&self, code: ClassificationCode) -> &str {
        self.labels.get(&code).map(String::as_str).unwrap_or(code.default_label())
    }

    /// Classify one page. `notes` are pipeline findings (degraded stages,
    /// failed detectors) appended after the rule's own issues.
    pub fn classify(&self, page: PageMetadata, details: DetectionDetails, notes: Vec<Issue>) -> ClassificationResult {
        let (rule, outcome) = rules::evaluate(&details);
        let mut issues = outcome.issues;
        issues.extend(notes);

        if outcome.is_valid {
            info!(source = %page.source, code = %rule.code, confidence = outcome.confidence, "Document classified");
        } else {
            warn!(source = %page.source, code = %rule.code, confidence = outcome.confidence, "Document classified as invalid");
        }

        ClassificationResult {
            label: self.label(outcome.code).to_string(),
            classification_code: outcome.code,
            confidence: Confidence::new(outcome.confidence),
            is_valid: outcome.is_valid,
            page,
            details,
            issues,
            recommendations: outcome.recommendations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podcheck_core::LegibilityReport;

    fn page() -> PageMetadata {
        PageMetadata {
            source: "pod-0001.png".into(),
            page_index: 0,
            width: 1200,
            height: 1600,
            sharpness: 350.0,
            is_blurry: false,
            digest: String::new(),
            normalization: Default::default(),
            quality: Default::default(),
        }
    }

    #[test]
    fn configured_labels_override_defaults() {
        let mut config = PodConfig::default();
        config.labels.insert(ClassificationCode::NoAcknowledgement, "Sin acuse".into());
        let classifier = Classifier::new(&config);
        assert_eq!(classifier.label(ClassificationCode::NoAcknowledgement), "Sin acuse");
        assert_eq!(classifier.label(ClassificationCode::Ok), ClassificationCode::Ok.default_label());
    }

    #[test]
    fn notes_follow_rule_issues() {
        let details = DetectionDetails {
            legibility: LegibilityReport {
                is_legible: true,
                is_complete: true,
                ..LegibilityReport::default()
            },
            ..DetectionDetails::default()
        };
        let result = Classifier::new(&PodConfig::default()).classify(
            page(),
            details,
            vec![Issue::warning("stage `denoise` failed: empty image")],
        );
        assert_eq!(result.classification_code, ClassificationCode::NoAcknowledgement);
        assert_eq!(result.label, ClassificationCode::NoAcknowledgement.default_label());
        assert_eq!(result.issues.len(), 2);
        assert!(result.issues[1].message.contains("denoise"));
        assert_eq!(result.page.source, "pod-0001.png");
    }
}
