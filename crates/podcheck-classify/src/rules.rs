// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The classification rule table.
//
// Rules are evaluated top to bottom and the first whose predicate holds
// decides the outcome. The last rule always matches, so every page gets
// exactly one code.

use podcheck_core::{ClassificationCode, DetectionDetails, Issue, Sentiment};

/// What a matching rule decides.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub code: ClassificationCode,
    pub confidence: f64,
    pub is_valid: bool,
    pub issues: Vec<Issue>,
    pub recommendations: Vec<String>,
}

impl Outcome {
    fn new(code: ClassificationCode, confidence: f64, is_valid: bool) -> Self {
        Self {
            code,
            confidence,
            is_valid,
            issues: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    fn issue(mut self, issue: Issue) -> Self {
        self.issues.push(issue);
        self
    }

    fn recommend(mut self, text: impl Into<String>) -> Self {
        self.recommendations.push(text.into());
        self
    }
}

/// One `(predicate, outcome)` row.
pub struct Rule {
    pub code: ClassificationCode,
    pub applies: fn(&DetectionDetails) -> bool,
    pub decide: fn(&DetectionDetails) -> Outcome,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("code", &self.code).finish_non_exhaustive()
    }
}

/// Priority order: incomplete, illegible, acknowledged, annotated, fallback.
pub static RULES: [Rule; 5] = [
    Rule {
        code: ClassificationCode::Incomplete,
        applies: |d| !d.legibility.is_complete,
        decide: incomplete,
    },
    Rule {
        code: ClassificationCode::Illegible,
        applies: |d| !d.legibility.is_legible,
        decide: illegible,
    },
    Rule {
        code: ClassificationCode::Ok,
        applies: |d| d.has_valid_signature() || d.has_valid_stamp(),
        decide: acknowledged,
    },
    Rule {
        code: ClassificationCode::WithAnnotations,
        applies: |d| d.annotations.has_annotations,
        decide: annotated,
    },
    Rule {
        code: ClassificationCode::NoAcknowledgement,
        applies: |_| true,
        decide: unacknowledged,
    },
];

fn incomplete(_: &DetectionDetails) -> Outcome {
    Outcome::new(ClassificationCode::Incomplete, 0.9, false)
        .issue(Issue::error("Document not fully captured (cut off or partial)"))
        .recommend("Re-scan the complete document")
}

fn illegible(d: &DetectionDetails) -> Outcome {
    let report = &d.legibility;
    let mut outcome = Outcome::new(ClassificationCode::Illegible, 0.85, false);
    outcome.issues.extend(report.issues.iter().cloned().map(Issue::error));
    if !report.fields_missing.is_empty() {
        outcome = outcome.issue(Issue::warning(format!("Missing fields: {}", report.fields_missing.join(", "))));
    }
    outcome.recommend("Improve the scan or photo quality")
}

fn acknowledged(d: &DetectionDetails) -> Outcome {
    let mut outcome = Outcome::new(ClassificationCode::Ok, 0.95, true);
    let signatures = d.signatures.iter().filter(|s| s.is_valid).count();
    if signatures > 0 {
        outcome = outcome.issue(Issue::info(format!("Valid signature detected ({signatures} signature(s))")));
    }
    let stamps = d.stamps.iter().filter(|s| s.is_valid).count();
    if stamps > 0 {
        outcome = outcome.issue(Issue::info(format!("Valid customer stamp detected ({stamps} stamp(s))")));
    }
    if d.annotations.has_annotations {
        // A complaint does not override a signature or stamp; it is only flagged.
        outcome = match d.annotations.sentiment {
            Sentiment::Negative => outcome
                .issue(Issue::warning("WARNING: contains negative annotations (possible claim)"))
                .recommend("Review the annotations manually"),
            Sentiment::Positive => outcome.issue(Issue::info("Contains positive annotations confirming receipt")),
            Sentiment::Neutral => outcome.issue(Issue::info("Contains annotations of unclear sentiment")),
        };
    }
    outcome
}

fn annotated(d: &DetectionDetails) -> Outcome {
    match d.annotations.sentiment {
        Sentiment::Positive => Outcome::new(ClassificationCode::WithAnnotations, 0.8, true)
            .issue(Issue::info("Annotations confirm receipt of the goods"))
            .recommend("Review the annotations to confirm"),
        Sentiment::Negative => Outcome::new(ClassificationCode::WithAnnotations, 0.8, false)
            .issue(Issue::warning("Annotations indicate a possible claim"))
            .recommend("Urgent review required: possible delivery problem"),
        Sentiment::Neutral => Outcome::new(ClassificationCode::WithAnnotations, 0.8, false)
            .issue(Issue::warning("Annotations present but their sentiment is unclear"))
            .recommend("Manual review required to interpret the annotations"),
    }
}

fn unacknowledged(_: &DetectionDetails) -> Outcome {
    Outcome::new(ClassificationCode::NoAcknowledgement, 0.9, false)
        .issue(Issue::error("No acknowledgement evidence (no signature, stamp or annotations)"))
        .recommend("Request a copy signed or stamped by the customer")
}

/// The first matching rule and its outcome.
pub fn evaluate(details: &DetectionDetails) -> (&'static Rule, Outcome) {
    for rule in &RULES {
        if (rule.applies)(details) {
            return (rule, (rule.decide)(details));
        }
    }
    let fallback = &RULES[RULES.len() - 1];
    (fallback, (fallback.decide)(details))
}

#[cfg(test)]
mod tests {
    use super::*;
    use podcheck_core::{
        AnnotationRegion, AnnotationReport, BoundingBox, Confidence, LegibilityReport, SignatureCandidate,
        StampCandidate, StampShape,
    };

    fn legible_complete() -> LegibilityReport {
        LegibilityReport {
            is_legible: true,
            is_complete: true,
            ..LegibilityReport::default()
        }
    }

    fn details() -> DetectionDetails {
        DetectionDetails {
            legibility: legible_complete(),
            ..DetectionDetails::default()
        }
    }

    fn stamp(text: &str, is_valid: bool) -> StampCandidate {
        StampCandidate {
            bbox: BoundingBox::new(10, 10, 80, 80),
            confidence: Confidence::new(0.9),
            shape: StampShape::Circular,
            circularity: 0.9,
            vertices: None,
            text: text.into(),
            is_valid,
        }
    }

    fn signature(is_valid: bool) -> SignatureCandidate {
        SignatureCandidate {
            bbox: BoundingBox::new(10, 200, 90, 30),
            confidence: Confidence::new(0.75),
            region: Some(if is_valid { "zone_7" } else { "zone_3" }.into()),
            area: 900.0,
            aspect_ratio: 3.0,
            density: 0.3,
            is_valid,
        }
    }

    fn annotations(sentiments: &[Sentiment]) -> AnnotationReport {
        AnnotationReport::from_regions(
            sentiments
                .iter()
                .map(|&sentiment| AnnotationRegion {
                    bbox: BoundingBox::new(0, 0, 100, 20),
                    confidence: Confidence::new(0.8),
                    density: 0.2,
                    text: String::new(),
                    sentiment,
                })
                .collect(),
        )
    }

    #[test]
    fn table_is_in_priority_order() {
        let codes: Vec<_> = RULES.iter().map(|r| r.code).collect();
        assert_eq!(
            codes,
            vec![
                ClassificationCode::Incomplete,
                ClassificationCode::Illegible,
                ClassificationCode::Ok,
                ClassificationCode::WithAnnotations,
                ClassificationCode::NoAcknowledgement,
            ]
        );
    }

    #[test]
    fn incomplete_beats_everything() {
        let mut d = details();
        d.legibility.is_complete = false;
        d.legibility.is_legible = false;
        d.signatures.push(signature(true));
        d.stamps.push(stamp("acme", true));
        d.annotations = annotations(&[Sentiment::Positive]);
        let (rule, outcome) = evaluate(&d);
        assert_eq!(rule.code, ClassificationCode::Incomplete);
        assert_eq!(outcome.confidence, 0.9);
        assert!(!outcome.is_valid);
    }

    #[test]
    fn illegible_copies_issues_and_missing_fields() {
        let mut d = details();
        d.legibility.is_legible = false;
        d.legibility.issues = vec!["Low OCR confidence: 30.0/60".into()];
        d.legibility.fields_missing = vec!["client".into(), "order".into()];
        d.stamps.push(stamp("acme", true));
        let (_, outcome) = evaluate(&d);
        assert_eq!(outcome.code, ClassificationCode::Illegible);
        assert_eq!(outcome.confidence, 0.85);
        let messages: Vec<_> = outcome.issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(messages, vec!["Low OCR confidence: 30.0/60", "Missing fields: client, order"]);
    }

    #[test]
    fn blocklisted_stamp_does_not_acknowledge() {
        let mut d = details();
        d.stamps.push(stamp("deacero", false));
        d.signatures.push(signature(false));
        let (_, outcome) = evaluate(&d);
        assert_eq!(outcome.code, ClassificationCode::NoAcknowledgement);
        assert!(!outcome.is_valid);
    }

    #[test]
    fn ok_keeps_priority_over_a_complaint_but_warns() {
        let mut d = details();
        d.signatures.push(signature(true));
        d.annotations = annotations(&[Sentiment::Positive, Sentiment::Negative]);
        let (_, outcome) = evaluate(&d);
        assert_eq!(outcome.code, ClassificationCode::Ok);
        assert!(outcome.is_valid);
        assert_eq!(outcome.confidence, 0.95);
        assert!(outcome
            .issues
            .iter()
            .any(|i| i.severity == podcheck_core::IssueSeverity::Warning && i.message.contains("negative")));
        assert_eq!(outcome.recommendations, vec!["Review the annotations manually"]);
    }

    #[test]
    fn annotation_sentiment_decides_validity() {
        for (sentiment, valid) in [
            (Sentiment::Positive, true),
            (Sentiment::Negative, false),
            (Sentiment::Neutral, false),
        ] {
            let mut d = details();
            d.annotations = annotations(&[sentiment]);
            let (_, outcome) = evaluate(&d);
            assert_eq!(outcome.code, ClassificationCode::WithAnnotations);
            assert_eq!(outcome.confidence, 0.8);
            assert_eq!(outcome.is_valid, valid, "{sentiment:?}");
        }
    }

    #[test]
    fn nothing_found_is_no_acknowledgement() {
        let (rule, outcome) = evaluate(&details());
        assert_eq!(rule.code, ClassificationCode::NoAcknowledgement);
        assert_eq!(outcome.confidence, 0.9);
        assert!(!outcome.is_valid);
    }
}
