// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Podcheck.

use thiserror::Error;

/// Top-level error type for all Podcheck operations.
#[derive(Debug, Error)]
pub enum PodError {
    // -- Configuration errors --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid zone `{name}`: {reason}")]
    InvalidZone { name: String, reason: String },

    // -- Document errors --
    #[error("unsupported document type: {0}")]
    UnsupportedDocument(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Recoverable processing errors --
    #[error("OCR failed: {0}")]
    OcrError(String),

    #[error("stage `{stage}` failed: {reason}")]
    Stage { stage: String, reason: String },

    #[error("engine pool error: {0}")]
    Pool(String),

    // -- Storage / encoding --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// How far an error is allowed to propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed configuration. Abort before any document is processed.
    Configuration,
    /// A single stage or backend failed. Skip it and keep going.
    Recoverable,
    /// The document itself is unreadable. Skip the document, not the batch.
    Document,
}

impl PodError {
    /// Shorthand for a stage failure.
    pub fn stage(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Classify the error into the propagation taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Config(_) | Self::InvalidZone { .. } | Self::Toml(_) => ErrorClass::Configuration,
            Self::OcrError(_) | Self::Stage { .. } | Self::Pool(_) => ErrorClass::Recoverable,
            Self::UnsupportedDocument(_)
            | Self::ImageError(_)
            | Self::Io(_)
            | Self::Serialization(_) => ErrorClass::Document,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PodError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_errors_are_configuration_class() {
        let err = PodError::InvalidZone {
            name: "zone_1".into(),
            reason: "x_start >= x_end".into(),
        };
        assert_eq!(err.class(), ErrorClass::Configuration);
        assert!(err.to_string().contains("zone_1"));
    }

    #[test]
    fn stage_errors_are_recoverable() {
        let err = PodError::stage("deblur", "empty image");
        assert_eq!(err.class(), ErrorClass::Recoverable);
        assert_eq!(err.to_string(), "stage `deblur` failed: empty image");
    }

    #[test]
    fn decode_errors_skip_the_document() {
        let err = PodError::ImageError("truncated PNG".into());
        assert_eq!(err.class(), ErrorClass::Document);
    }
}
