// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Validator configuration.
//
// The six core sections (`zones`, `required_fields`, `thresholds`,
// `invalid_stamps`, `annotation_keywords`, `acknowledgement_zones`) are
// mandatory. Tuning sections fall back to defaults. Every section rejects
// unknown keys, and `validate()` runs on every load path so a bad file never
// reaches the pipeline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{PodError, Result};
use crate::types::{ClassificationCode, StageKind};

// -- Zones --------------------------------------------------------------------

/// A named rectangle expressed as fractions of page width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Zone {
    pub x_start: f64,
    pub x_end: f64,
    pub y_start: f64,
    pub y_end: f64,
}

impl Zone {
    pub fn new(x_start: f64, x_end: f64, y_start: f64, y_end: f64) -> Self {
        Self {
            x_start,
            x_end,
            y_start,
            y_end,
        }
    }

    /// Check `0 <= start < end <= 1` on both axes.
    pub fn validate(&self, name: &str) -> Result<()> {
        let invalid = |reason: String| PodError::InvalidZone {
            name: name.to_string(),
            reason,
        };
        for (axis, start, end) in [("x", self.x_start, self.x_end), ("y", self.y_start, self.y_end)]
        {
            if !start.is_finite() || !end.is_finite() {
                return Err(invalid(format!("{axis} bounds must be finite")));
            }
            if start < 0.0 || end > 1.0 {
                return Err(invalid(format!(
                    "{axis} bounds [{start}, {end}] fall outside [0, 1]"
                )));
            }
            if start >= end {
                return Err(invalid(format!("{axis}_start {start} must be below {axis}_end {end}")));
            }
        }
        Ok(())
    }

    /// Integer pixel bounds `(x0, y0, x1, y1)` against a page of the given size.
    ///
    /// Start coordinates are truncated; the result is always at least one pixel
    /// wide and high, and never extends past the page.
    pub fn pixel_bounds(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let scale = |fraction: f64, extent: u32| -> u32 {
            ((fraction * extent as f64) as u32).min(extent)
        };
        let x0 = scale(self.x_start, width).min(width.saturating_sub(1));
        let y0 = scale(self.y_start, height).min(height.saturating_sub(1));
        let x1 = scale(self.x_end, width).max(x0 + 1).min(width.max(1));
        let y1 = scale(self.y_end, height).max(y0 + 1).min(height.max(1));
        (x0, y0, x1, y1)
    }
}

// -- Fields and keywords ------------------------------------------------------

/// A field that a legible delivery note is expected to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequiredField {
    pub name: String,
    /// Case-insensitive synonyms. An empty list matches on `name` itself.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl RequiredField {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// True if any synonym occurs in `lowercase_text`.
    pub fn matches(&self, lowercase_text: &str) -> bool {
        if self.keywords.is_empty() {
            return lowercase_text.contains(&self.name.to_lowercase());
        }
        self.keywords
            .iter()
            .any(|k| lowercase_text.contains(&k.to_lowercase()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnnotationKeywords {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
}

// -- Thresholds ---------------------------------------------------------------

/// Detector thresholds. All eleven keys are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Thresholds {
    /// Laplacian variance below which a page is blurry.
    pub blur_threshold: f64,
    pub min_text_quality: f64,
    pub min_fields_detected: usize,
    /// Mean OCR confidence on a 0–100 scale.
    pub min_confidence: f64,
    pub signature_min_area: f64,
    pub signature_max_area: f64,
    pub signature_confidence: f64,
    pub stamp_min_area: f64,
    pub stamp_max_area: f64,
    pub stamp_circularity: f64,
    pub handwriting_confidence: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            blur_threshold: 100.0,
            min_text_quality: 0.5,
            min_fields_detected: 3,
            min_confidence: 60.0,
            signature_min_area: 500.0,
            signature_max_area: 50_000.0,
            signature_confidence: 0.6,
            stamp_min_area: 2_000.0,
            stamp_max_area: 100_000.0,
            stamp_circularity: 0.7,
            handwriting_confidence: 0.5,
        }
    }
}

// -- Normalizer ---------------------------------------------------------------

/// How much restoration work the normalizer performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnhancementLevel {
    /// Resize, contrast, sharpen.
    Basic,
    /// Basic plus orientation and denoise.
    Medium,
    /// All six standard stages.
    #[default]
    High,
    /// High plus deblur, perspective and super-resolution.
    Ultra,
    /// Picked per page from the capture-quality score.
    Auto,
}

impl EnhancementLevel {
    /// Stages run at this level. `Auto` must be resolved first and runs nothing.
    pub fn stages(&self) -> &'static [StageKind] {
        use StageKind::*;
        match self {
            Self::Basic => &[Resize, Contrast, Sharpen],
            Self::Medium => &[Orientation, Resize, Contrast, Denoise, Sharpen],
            Self::High => &[Orientation, Resize, Contrast, Denoise, Illumination, Sharpen],
            Self::Ultra => &StageKind::PIPELINE,
            Self::Auto => &[],
        }
    }

    pub fn enables(&self, stage: StageKind) -> bool {
        self.stages().contains(&stage)
    }

    /// Map a 0–100 quality score to a concrete level.
    pub fn for_quality_score(score: f64) -> Self {
        match score {
            s if s >= 80.0 => Self::Basic,
            s if s >= 70.0 => Self::Medium,
            s if s >= 50.0 => Self::High,
            _ => Self::Ultra,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizerConfig {
    pub level: EnhancementLevel,
    /// Longest side above which pages are downscaled.
    pub max_dimension: u32,
    /// Longest side below which pages are upscaled.
    pub min_dimension: u32,
    /// Tiles per axis for local contrast equalization.
    pub clahe_grid: u32,
    /// Non-local means filter strength `h`.
    pub denoise_strength: f32,
    pub denoise_patch_radius: u32,
    pub denoise_search_radius: u32,
    /// Weight of the sharpened image in the final blend.
    pub sharpen_mix: f32,
    /// Laplacian variance below which deblurring triggers.
    pub deblur_threshold: f64,
    pub deblur_iterations: u32,
    /// Longest side below which super-resolution triggers.
    pub super_resolution_below: u32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            level: EnhancementLevel::High,
            max_dimension: 3000,
            min_dimension: 1000,
            clahe_grid: 8,
            denoise_strength: 10.0,
            denoise_patch_radius: 3,
            denoise_search_radius: 5,
            sharpen_mix: 0.7,
            deblur_threshold: 100.0,
            deblur_iterations: 10,
            super_resolution_below: 1500,
        }
    }
}

// -- Analysis -----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Width in pixels of each border strip inspected for completeness.
    pub border_width: u32,
    pub min_border_variance: f64,
    /// Word count at which the word-count factor of text quality saturates.
    pub word_count_ceiling: usize,
    pub annotation_min_area: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            border_width: 10,
            min_border_variance: 100.0,
            word_count_ceiling: 50,
            annotation_min_area: 500.0,
        }
    }
}

// -- OCR ----------------------------------------------------------------------

/// How multiple backend outputs are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusMethod {
    #[default]
    Voting,
    Best,
    All,
}

/// One OCR backend. Paths are explicit; nothing is resolved from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "engine", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Pure-Rust `ocrs` engine. Requires the `ocr` feature.
    Ocrs {
        model_dir: PathBuf,
        #[serde(default = "default_nominal_confidence")]
        nominal_confidence: f64,
    },
    /// External `tesseract` executable driven through its TSV output.
    Tesseract {
        binary: PathBuf,
        #[serde(default = "default_tesseract_language")]
        language: String,
        #[serde(default = "default_tesseract_psm")]
        psm: u8,
    },
}

fn default_nominal_confidence() -> f64 {
    0.85
}

fn default_tesseract_language() -> String {
    "eng".to_string()
}

fn default_tesseract_psm() -> u8 {
    6
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OcrSettings {
    pub method: ConsensusMethod,
    pub backends: Vec<BackendConfig>,
}

// -- Batch --------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Worker threads; zero means one per available core.
    pub workers: usize,
    /// Lowercase file extensions picked up from directories.
    pub supported_formats: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            supported_formats: ["png", "jpg", "jpeg", "tif", "tiff", "bmp", "gif", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl BatchConfig {
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let ext = e.to_lowercase();
                self.supported_formats.iter().any(|f| *f == ext)
            })
            .unwrap_or(false)
    }
}

// -- Top level ----------------------------------------------------------------

/// Complete validator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PodConfig {
    pub zones: BTreeMap<String, Zone>,
    pub required_fields: Vec<RequiredField>,
    pub thresholds: Thresholds,
    pub invalid_stamps: Vec<String>,
    pub annotation_keywords: AnnotationKeywords,
    pub acknowledgement_zones: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<ClassificationCode, String>,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub ocr: OcrSettings,
    #[serde(default)]
    pub batch: BatchConfig,
}

impl Default for PodConfig {
    fn default() -> Self {
        let zones = [
            ("zone_1", Zone::new(0.0, 0.5, 0.0, 0.15)),
            ("zone_2", Zone::new(0.5, 1.0, 0.0, 0.15)),
            ("zone_3", Zone::new(0.0, 1.0, 0.15, 0.4)),
            ("zone_4", Zone::new(0.0, 0.5, 0.4, 0.7)),
            ("zone_5", Zone::new(0.5, 1.0, 0.4, 0.7)),
            ("zone_6", Zone::new(0.0, 0.34, 0.7, 1.0)),
            ("zone_7", Zone::new(0.33, 0.67, 0.7, 1.0)),
            ("zone_8", Zone::new(0.66, 1.0, 0.7, 1.0)),
        ]
        .into_iter()
        .map(|(name, zone)| (name.to_string(), zone))
        .collect();

        let required_fields = vec![
            RequiredField::new("invoice", &["factura", "fact", "invoice", "no.", "núm", "numero"]),
            RequiredField::new("client", &["cliente", "client", "razón social", "razon social"]),
            RequiredField::new("order", &["pedido", "orden", "order", "o.c."]),
            RequiredField::new(
                "product",
                &["producto", "material", "descripción", "articulo", "artículo", "product"],
            ),
            RequiredField::new("signature", &["firma", "recibí", "recibi", "nombre", "signature"]),
        ];

        let words = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        Self {
            zones,
            required_fields,
            thresholds: Thresholds::default(),
            invalid_stamps: Vec::new(),
            annotation_keywords: AnnotationKeywords {
                positive: words(&[
                    "conforme",
                    "recibido",
                    "received",
                    "buen estado",
                    "good condition",
                    "entregado",
                    "delivered",
                ]),
                negative: words(&[
                    "falta",
                    "faltante",
                    "dañado",
                    "damaged",
                    "missing",
                    "rechazado",
                    "rejected",
                    "roto",
                    "broken",
                    "devolución",
                    "returned",
                ]),
            },
            acknowledgement_zones: words(&["zone_6", "zone_7", "zone_8"]),
            labels: BTreeMap::new(),
            normalizer: NormalizerConfig::default(),
            analysis: AnalysisConfig::default(),
            ocr: OcrSettings::default(),
            batch: BatchConfig::default(),
        }
    }
}

/// Serialization format of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

impl PodConfig {
    // -- Loading --------------------------------------------------------------

    /// Load and validate a configuration file. The format follows the extension.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            PodError::Config(format!(
                "unsupported configuration format for {} (expected .json or .toml)",
                path.display()
            ))
        })?;
        let contents = std::fs::read_to_string(path)?;
        let config = match format {
            ConfigFormat::Json => Self::from_json_str(&contents)?,
            ConfigFormat::Toml => Self::from_toml_str(&contents)?,
        };
        info!(
            zones = config.zones.len(),
            required_fields = config.required_fields.len(),
            backends = config.ocr.backends.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(contents)
            .map_err(|err| PodError::Config(format!("malformed JSON configuration: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    // -- Validation -----------------------------------------------------------

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.zones.is_empty() {
            return Err(PodError::Config("at least one zone is required".into()));
        }
        for (name, zone) in &self.zones {
            zone.validate(name)?;
        }
        for name in &self.acknowledgement_zones {
            if !self.zones.contains_key(name) {
                return Err(PodError::Config(format!(
                    "acknowledgement zone `{name}` is not defined in `zones`"
                )));
            }
        }

        if self.required_fields.is_empty() {
            return Err(PodError::Config("required_fields must not be empty".into()));
        }
        for field in &self.required_fields {
            if field.name.trim().is_empty() {
                return Err(PodError::Config("required field with empty name".into()));
            }
            check_terms(&format!("required_fields.{}.keywords", field.name), &field.keywords)?;
        }
        // A blank term would match every page.
        check_terms("invalid_stamps", &self.invalid_stamps)?;
        check_terms("annotation_keywords.positive", &self.annotation_keywords.positive)?;
        check_terms("annotation_keywords.negative", &self.annotation_keywords.negative)?;

        let t = &self.thresholds;
        if t.min_fields_detected > self.required_fields.len() {
            return Err(PodError::Config(format!(
                "min_fields_detected ({}) exceeds the number of required fields ({})",
                t.min_fields_detected,
                self.required_fields.len()
            )));
        }
        check_range("signature area", t.signature_min_area, t.signature_max_area)?;
        check_range("stamp area", t.stamp_min_area, t.stamp_max_area)?;
        for (key, value) in [
            ("min_text_quality", t.min_text_quality),
            ("signature_confidence", t.signature_confidence),
            ("stamp_circularity", t.stamp_circularity),
            ("handwriting_confidence", t.handwriting_confidence),
        ] {
            check_unit(key, value)?;
        }
        if !(0.0..=100.0).contains(&t.min_confidence) {
            return Err(PodError::Config(format!(
                "min_confidence must be on a 0-100 scale, got {}",
                t.min_confidence
            )));
        }
        if !t.blur_threshold.is_finite() || t.blur_threshold < 0.0 {
            return Err(PodError::Config("blur_threshold must be non-negative".into()));
        }

        let n = &self.normalizer;
        if n.min_dimension == 0 || n.min_dimension >= n.max_dimension {
            return Err(PodError::Config(format!(
                "normalizer.min_dimension ({}) must be positive and below max_dimension ({})",
                n.min_dimension, n.max_dimension
            )));
        }
        if n.clahe_grid == 0 {
            return Err(PodError::Config("normalizer.clahe_grid must be positive".into()));
        }
        check_unit("normalizer.sharpen_mix", n.sharpen_mix as f64)?;

        let a = &self.analysis;
        if a.border_width == 0 {
            return Err(PodError::Config("analysis.border_width must be positive".into()));
        }
        if a.word_count_ceiling == 0 {
            return Err(PodError::Config("analysis.word_count_ceiling must be positive".into()));
        }

        for backend in &self.ocr.backends {
            match backend {
                BackendConfig::Ocrs {
                    nominal_confidence, ..
                } => check_unit("ocrs.nominal_confidence", *nominal_confidence)?,
                BackendConfig::Tesseract { binary, .. } => {
                    if binary.as_os_str().is_empty() {
                        return Err(PodError::Config("tesseract.binary must not be empty".into()));
                    }
                }
            }
        }

        debug!("Configuration validated");
        Ok(())
    }

    // -- Accessors ------------------------------------------------------------

    pub fn label(&self, code: ClassificationCode) -> String {
        self.labels
            .get(&code)
            .cloned()
            .unwrap_or_else(|| code.default_label().to_string())
    }

    pub fn is_acknowledgement_zone(&self, name: &str) -> bool {
        self.acknowledgement_zones.iter().any(|z| z == name)
    }
}

fn check_range(what: &str, min: f64, max: f64) -> Result<()> {
    if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
        return Err(PodError::Config(format!(
            "{what} range [{min}, {max}] is invalid"
        )));
    }
    Ok(())
}

fn check_unit(key: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(PodError::Config(format!("{key} must lie in [0, 1], got {value}")));
    }
    Ok(())
}

fn check_terms(key: &str, terms: &[String]) -> Result<()> {
    if let Some(index) = terms.iter().position(|t| t.trim().is_empty()) {
        return Err(PodError::Config(format!("{key}[{index}] must not be blank")));
    }
    Ok(())
}
