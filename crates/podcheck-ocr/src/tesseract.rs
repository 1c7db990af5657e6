// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tesseract backend driven through the command-line tool.
//
// The image is piped to `tesseract stdin stdout ... tsv` as PNG and the TSV
// word table is parsed for text and per-word confidences. The binary path is
// taken from configuration only.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use image::{DynamicImage, ImageFormat};
use podcheck_core::error::{PodError, Result};
use tracing::{debug, instrument};

use crate::backend::{OcrBackend, RecognizedText, Word};

/// TSV row level for a single word.
const WORD_LEVEL: &str = "5";

/// `tesseract` CLI wrapper.
#[derive(Debug, Clone)]
pub struct TesseractCliBackend {
    binary: PathBuf,
    language: String,
    psm: u8,
}

impl TesseractCliBackend {
    pub fn new(binary: impl Into<PathBuf>, language: impl Into<String>, psm: u8) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
            psm,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// True if the binary answers `--version`.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl OcrBackend for TesseractCliBackend {
    fn name(&self) -> &str {
        "tesseract"
    }

    #[instrument(skip_all, fields(binary = %self.binary.display(), lang = %self.language))]
    fn recognize(&self, image: &DynamicImage) -> Result<RecognizedText> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|err| PodError::OcrError(format!("failed to encode image for tesseract: {err}")))?;

        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", &self.language, "--psm", &self.psm.to_string(), "tsv"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                PodError::OcrError(format!("failed to run {}: {err}", self.binary.display()))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&png)
                .map_err(|err| PodError::OcrError(format!("failed to send image to tesseract: {err}")))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|err| PodError::OcrError(format!("tesseract did not finish: {err}")))?;
        if !output.status.success() {
            return Err(PodError::OcrError(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let parsed = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        debug!(words = parsed.words.len(), confidence = parsed.confidence, "Tesseract output parsed");
        Ok(parsed)
    }
}

/// Parse tesseract's TSV output.
///
/// Words are rows at level 5 with a positive confidence (0–100 in the file,
/// rescaled to 0–1). Words sharing a block, paragraph and line number are
/// joined by spaces; lines are joined by newlines.
pub fn parse_tsv(tsv: &str) -> RecognizedText {
    let mut words = Vec::new();
    let mut lines: Vec<String> = Vec::new();
    let mut current_line: Option<(String, String, String)> = None;

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != WORD_LEVEL {
            continue;
        }
        let text = cols[11..].join("\t");
        let text = text.trim();
        let confidence: f64 = cols[10].trim().parse().unwrap_or(-1.0);
        if text.is_empty() || confidence <= 0.0 {
            continue;
        }
        let line_key = (cols[2].to_string(), cols[3].to_string(), cols[4].to_string());
        match lines.last_mut() {
            Some(line) if current_line.as_ref() == Some(&line_key) => {
                line.push(' ');
                line.push_str(text);
            }
            _ => {
                lines.push(text.to_string());
                current_line = Some(line_key);
            }
        }
        words.push(Word {
            text: text.to_string(),
            confidence: (confidence / 100.0).clamp(0.0, 1.0),
        });
    }
    RecognizedText::from_words(lines.join("\n"), words)
}
