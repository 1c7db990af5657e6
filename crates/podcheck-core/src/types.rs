// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Podcheck document validator.

use serde::{Deserialize, Serialize};

// -- Confidence ---------------------------------------------------------------

/// A score in the closed interval [0, 1].
///
/// Construction clamps out-of-range input and maps NaN to zero. Deserialized
/// values go through the same clamp.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub const ZERO: Self = Self(0.0);
    pub const ONE: Self = Self(1.0);

    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            Self(0.0)
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<f64> for Confidence {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(confidence: Confidence) -> Self {
        confidence.0
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

// -- Geometry -----------------------------------------------------------------

/// Axis-aligned rectangle in page pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width divided by height; zero for a degenerate box.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f64 / self.height as f64
        }
    }

    /// Shift the box by a zone origin so it is expressed in page coordinates.
    pub fn translate(self, dx: u32, dy: u32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    pub fn contains_point(&self, px: u32, py: u32) -> bool {
        px >= self.x && py >= self.y && px < self.x + self.width && py < self.y + self.height
    }
}

// -- Classification -----------------------------------------------------------

/// The five mutually exclusive outcomes of document validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassificationCode {
    /// A valid signature or stamp acknowledges receipt.
    Ok,
    /// No signature or stamp, but handwritten remarks are present.
    WithAnnotations,
    /// No acknowledgement evidence at all.
    NoAcknowledgement,
    /// Text could not be read reliably.
    Illegible,
    /// The page was cut off during capture.
    Incomplete,
}

impl ClassificationCode {
    pub const ALL: [ClassificationCode; 5] = [
        Self::Ok,
        Self::WithAnnotations,
        Self::NoAcknowledgement,
        Self::Illegible,
        Self::Incomplete,
    ];

    /// Stable wire name, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::WithAnnotations => "WITH_ANNOTATIONS",
            Self::NoAcknowledgement => "NO_ACKNOWLEDGEMENT",
            Self::Illegible => "ILLEGIBLE",
            Self::Incomplete => "INCOMPLETE",
        }
    }

    /// Human label used when the configuration does not override it.
    pub fn default_label(&self) -> &'static str {
        match self {
            Self::Ok => "Valid delivery confirmation",
            Self::WithAnnotations => "Acknowledged with annotations",
            Self::NoAcknowledgement => "No signature or stamp",
            Self::Illegible => "Illegible document",
            Self::Incomplete => "Incomplete capture",
        }
    }
}

impl std::fmt::Display for ClassificationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tone of a handwritten remark regarding receipt of goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    /// Pessimistic aggregation: any negative dominates, then any positive.
    pub fn aggregate<I: IntoIterator<Item = Sentiment>>(items: I) -> Sentiment {
        let mut any_positive = false;
        for sentiment in items {
            match sentiment {
                Sentiment::Negative => return Sentiment::Negative,
                Sentiment::Positive => any_positive = true,
                Sentiment::Neutral => {}
            }
        }
        if any_positive {
            Sentiment::Positive
        } else {
            Sentiment::Neutral
        }
    }
}

// -- Detection candidates -----------------------------------------------------

/// Type tag shared by all detection candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionKind {
    Signature,
    Stamp,
    Annotation,
}

/// Common view over the typed candidate lists.
pub trait Detection {
    fn kind(&self) -> DetectionKind;
    fn bbox(&self) -> BoundingBox;
    fn confidence(&self) -> Confidence;
}

/// A handwriting-like contour found in one of the configured zones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureCandidate {
    pub bbox: BoundingBox,
    pub confidence: Confidence,
    /// Zone the contour was found in, if any.
    pub region: Option<String>,
    pub area: f64,
    pub aspect_ratio: f64,
    /// Ink fraction inside the bounding box.
    pub density: f64,
    /// True when the region is an acknowledgement zone.
    pub is_valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StampShape {
    Circular,
    Rectangular,
}

/// An ink-stamp-shaped contour and the text read from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampCandidate {
    pub bbox: BoundingBox,
    pub confidence: Confidence,
    pub shape: StampShape,
    pub circularity: f64,
    /// Polygon vertex count for rectangular stamps.
    pub vertices: Option<usize>,
    /// Lowercased text extracted from the stamp.
    pub text: String,
    /// False when the text matches the issuer blocklist.
    pub is_valid: bool,
}

/// A handwritten remark region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRegion {
    pub bbox: BoundingBox,
    pub confidence: Confidence,
    pub density: f64,
    pub text: String,
    pub sentiment: Sentiment,
}

/// Aggregate output of the annotation detector.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnnotationReport {
    pub has_annotations: bool,
    pub regions: Vec<AnnotationRegion>,
    pub sentiment: Sentiment,
    /// All region texts joined by a single space.
    pub text_content: String,
}

impl AnnotationReport {
    pub fn from_regions(regions: Vec<AnnotationRegion>) -> Self {
        let sentiment = Sentiment::aggregate(regions.iter().map(|r| r.sentiment));
        let text_content = regions
            .iter()
            .map(|r| r.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            has_annotations: !regions.is_empty(),
            regions,
            sentiment,
            text_content,
        }
    }
}

impl Detection for SignatureCandidate {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Signature
    }
    fn bbox(&self) -> BoundingBox {
        self.bbox
    }
    fn confidence(&self) -> Confidence {
        self.confidence
    }
}

impl Detection for StampCandidate {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Stamp
    }
    fn bbox(&self) -> BoundingBox {
        self.bbox
    }
    fn confidence(&self) -> Confidence {
        self.confidence
    }
}

impl Detection for AnnotationRegion {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Annotation
    }
    fn bbox(&self) -> BoundingBox {
        self.bbox
    }
    fn confidence(&self) -> Confidence {
        self.confidence
    }
}

// -- Legibility ---------------------------------------------------------------

/// Pixel-intensity variance of the four border strips of the original image.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BorderVariances {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl BorderVariances {
    pub fn min(&self) -> f64 {
        self.top.min(self.bottom).min(self.left).min(self.right)
    }
}

/// Result of the legibility and completeness analysis of one page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LegibilityReport {
    pub is_legible: bool,
    pub fields_detected: Vec<String>,
    pub fields_missing: Vec<String>,
    /// Mean token-level OCR confidence on a 0–100 scale.
    pub ocr_confidence: f64,
    /// Composite text-quality score in [0, 1].
    pub text_quality: f64,
    pub word_count: usize,
    pub is_blurry: bool,
    pub sharpness: f64,
    /// Separate from `is_legible`; checked first by the classifier.
    pub is_complete: bool,
    pub border_variances: BorderVariances,
    pub issues: Vec<String>,
}

// -- Normalization metadata ---------------------------------------------------

/// The image normalizer stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Orientation,
    Resize,
    Contrast,
    Denoise,
    Illumination,
    Sharpen,
    Deblur,
    Perspective,
    SuperResolution,
}

impl StageKind {
    pub const PIPELINE: [StageKind; 9] = [
        Self::Orientation,
        Self::Resize,
        Self::Contrast,
        Self::Denoise,
        Self::Illumination,
        Self::Sharpen,
        Self::Deblur,
        Self::Perspective,
        Self::SuperResolution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orientation => "orientation",
            Self::Resize => "resize",
            Self::Contrast => "contrast",
            Self::Denoise => "denoise",
            Self::Illumination => "illumination",
            Self::Sharpen => "sharpen",
            Self::Deblur => "deblur",
            Self::Perspective => "perspective",
            Self::SuperResolution => "super_resolution",
        }
    }
}

/// Explicit outcome of one normalizer stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    /// The stage transformed the image.
    Applied,
    /// Not enabled at this level, or its trigger condition did not hold.
    Skipped,
    /// The stage failed; its input was passed through unchanged.
    Degraded { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: StageKind,
    #[serde(flatten)]
    pub status: StageStatus,
}

/// What the normalizer did to a page, plus before/after metrics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub stages: Vec<StageReport>,
    pub sharpness_before: f64,
    pub sharpness_after: f64,
    pub contrast_before: f64,
    pub contrast_after: f64,
}

impl NormalizationReport {
    pub fn status_of(&self, stage: StageKind) -> Option<&StageStatus> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.status)
    }

    pub fn degraded(&self) -> impl Iterator<Item = &StageReport> {
        self.stages
            .iter()
            .filter(|r| matches!(r.status, StageStatus::Degraded { .. }))
    }
}

/// Letter grade derived from the overall quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QualityGrade {
    A,
    B,
    C,
    D,
    #[default]
    F,
}

impl QualityGrade {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 90.0 => Self::A,
            s if s >= 80.0 => Self::B,
            s if s >= 70.0 => Self::C,
            s if s >= 60.0 => Self::D,
            _ => Self::F,
        }
    }
}

/// Capture-quality assessment of the original image. Sub-scores are 0–100.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub overall_score: f64,
    pub grade: QualityGrade,
    pub sharpness: f64,
    pub contrast: f64,
    pub brightness: f64,
    pub noise: f64,
    pub resolution: f64,
    pub text_clarity: f64,
    pub weak_points: Vec<String>,
    pub recommendations: Vec<String>,
}

// -- Result -------------------------------------------------------------------

/// Metadata that survives after the page buffers are released.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageMetadata {
    pub source: String,
    pub page_index: u32,
    pub width: u32,
    pub height: u32,
    pub sharpness: f64,
    pub is_blurry: bool,
    /// SHA-256 of the input bytes, hex encoded. Empty for in-memory images.
    pub digest: String,
    pub normalization: NormalizationReport,
    pub quality: QualityAssessment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
}

/// One finding attached to a classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: IssueSeverity,
    pub message: String,
}

impl Issue {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Everything the detectors produced for one page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectionDetails {
    pub legibility: LegibilityReport,
    pub signatures: Vec<SignatureCandidate>,
    pub stamps: Vec<StampCandidate>,
    pub annotations: AnnotationReport,
}

impl DetectionDetails {
    pub fn has_valid_signature(&self) -> bool {
        self.signatures.iter().any(|s| s.is_valid)
    }

    pub fn has_valid_stamp(&self) -> bool {
        self.stamps.iter().any(|s| s.is_valid)
    }

    /// Every candidate across the three typed lists.
    pub fn candidates(&self) -> impl Iterator<Item = &dyn Detection> {
        self.signatures
            .iter()
            .map(|s| s as &dyn Detection)
            .chain(self.stamps.iter().map(|s| s as &dyn Detection))
            .chain(self.annotations.regions.iter().map(|a| a as &dyn Detection))
    }
}

/// Final output for one page. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub page: PageMetadata,
    pub classification_code: ClassificationCode,
    pub label: String,
    pub confidence: Confidence,
    pub is_valid: bool,
    pub details: DetectionDetails,
    pub issues: Vec<Issue>,
    pub recommendations: Vec<String>,
}
