// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Aggregate statistics over a set of classification results.

use std::collections::{BTreeMap, HashMap};

use podcheck_core::{ClassificationCode, ClassificationResult};
use serde::Serialize;

const TOP_ISSUES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueCount {
    pub message: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    /// Every code is present, including those with a zero count.
    pub by_code: BTreeMap<ClassificationCode, usize>,
    /// Share of valid documents, in percent. Zero for an empty set.
    pub validation_rate: f64,
    /// Most frequent issue messages, most common first.
    pub top_issues: Vec<IssueCount>,
}

impl ClassificationSummary {
    pub fn from_results(results: &[ClassificationResult]) -> Self {
        let total = results.len();
        let valid = results.iter().filter(|r| r.is_valid).count();

        let mut by_code: BTreeMap<ClassificationCode, usize> =
            ClassificationCode::ALL.into_iter().map(|code| (code, 0)).collect();
        for result in results {
            *by_code.entry(result.classification_code).or_default() += 1;
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for issue in results.iter().flat_map(|r| &r.issues) {
            *counts.entry(issue.message.as_str()).or_default() += 1;
        }
        let mut top_issues: Vec<IssueCount> = counts
            .into_iter()
            .map(|(message, count)| IssueCount {
                message: message.to_string(),
                count,
            })
            .collect();
        // Ties break alphabetically so the summary is stable.
        top_issues.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.message.cmp(&b.message)));
        top_issues.truncate(TOP_ISSUES);

        let validation_rate = if total == 0 {
            0.0
        } else {
            valid as f64 / total as f64 * 100.0
        };

        Self {
            total,
            valid,
            invalid: total - valid,
            by_code,
            validation_rate,
            top_issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podcheck_core::{Confidence, DetectionDetails, Issue, PageMetadata};

    fn result(code: ClassificationCode, is_valid: bool, issues: &[&str]) -> ClassificationResult {
        ClassificationResult {
            page: PageMetadata::default(),
            classification_code: code,
            label: code.default_label().to_string(),
            confidence: Confidence::new(0.9),
            is_valid,
            details: DetectionDetails::default(),
            issues: issues.iter().map(|m| Issue::error(*m)).collect(),
            recommendations: Vec::new(),
        }
    }

    #[test]
    fn empty_set_has_zero_rate_and_every_code() {
        let summary = ClassificationSummary::from_results(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.validation_rate, 0.0);
        assert_eq!(summary.by_code.len(), ClassificationCode::ALL.len());
        assert!(summary.by_code.values().all(|&n| n == 0));
    }

    #[test]
    fn counts_and_rate() {
        let results = [
            result(ClassificationCode::Ok, true, &[]),
            result(ClassificationCode::Ok, true, &[]),
            result(ClassificationCode::WithAnnotations, true, &[]),
            result(ClassificationCode::Illegible, false, &["Low OCR confidence: 20.0/60"]),
        ];
        let summary = ClassificationSummary::from_results(&results);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.valid, 3);
        assert_eq!(summary.invalid, 1);
        assert_eq!(summary.by_code[&ClassificationCode::Ok], 2);
        assert_eq!(summary.by_code[&ClassificationCode::Incomplete], 0);
        assert_eq!(summary.validation_rate, 75.0);
    }

    #[test]
    fn top_issues_are_ranked_and_capped() {
        let mut results = vec![
            result(ClassificationCode::Illegible, false, &["blurry", "few fields"]),
            result(ClassificationCode::Illegible, false, &["blurry"]),
            result(ClassificationCode::Illegible, false, &["blurry", "few fields"]),
        ];
        for i in 0..12 {
            let message = format!("rare {i:02}");
            results.push(result(ClassificationCode::NoAcknowledgement, false, &[message.as_str()]));
        }
        let summary = ClassificationSummary::from_results(&results);
        assert_eq!(summary.top_issues.len(), 10);
        assert_eq!(summary.top_issues[0], IssueCount { message: "blurry".into(), count: 3 });
        assert_eq!(summary.top_issues[1], IssueCount { message: "few fields".into(), count: 2 });
        assert_eq!(summary.top_issues[2].message, "rare 00");
    }

    #[test]
    fn serializes_codes_as_wire_names() {
        let summary = ClassificationSummary::from_results(&[result(ClassificationCode::Ok, true, &[])]);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["by_code"]["OK"], 1);
        assert_eq!(json["by_code"]["NO_ACKNOWLEDGEMENT"], 0);
    }
}
