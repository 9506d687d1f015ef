//! Line recognition for embedded images.
//!
//! The classifier needs three facts about an image: how many text lines it
//! holds, how confident the engine was, and whether the recognised words
//! sit in a grid. [`LineRecognizer`] is the seam; [`TesseractRecognizer`]
//! is the production implementation and tests substitute scripted ones.

use crate::error::PageError;
use crate::pipeline::encode::grayscale_png;
use crate::pipeline::source::Rect;
use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use tracing::debug;

/// Vertical bucket size for grouping tokens into rows, in pixels.
pub const ROW_TOLERANCE_PX: f32 = 10.0;

/// Minimum number of tokens before table detection is attempted.
pub const MIN_TABLE_TOKENS: usize = 6;

/// One recognised unit. Structural rows (page, block, paragraph, line) have
/// empty text and no confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrToken {
    pub text: String,
    pub rect: Rect,
    /// 0–100, `None` when the engine reports no confidence.
    pub confidence: Option<f32>,
}

impl OcrToken {
    pub fn word(text: impl Into<String>, left: f32, top: f32, confidence: f32) -> Self {
        Self {
            text: text.into(),
            rect: Rect::new(left, top, left + 10.0, top + 10.0),
            confidence: Some(confidence),
        }
    }
}

/// Recognised text plus the token layout it came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrOutput {
    /// Recognised text, one line per recognised line.
    pub text: String,
    pub tokens: Vec<OcrToken>,
}

impl OcrOutput {
    /// Non-blank lines of [`OcrOutput::text`].
    pub fn line_count(&self) -> usize {
        self.text.lines().filter(|l| !l.trim().is_empty()).count()
    }

    /// Mean confidence over tokens that have one, scaled to 0–1.
    pub fn mean_confidence(&self) -> f64 {
        let (sum, n) = self
            .tokens
            .iter()
            .filter_map(|t| t.confidence)
            .fold((0.0f64, 0usize), |(s, n), c| (s + c as f64, n + 1));
        if n == 0 {
            0.0
        } else {
            sum / n as f64 / 100.0
        }
    }

    /// At least two rows of non-blank tokens, one of which holds two or more
    /// tokens. Needs [`MIN_TABLE_TOKENS`] tokens in total.
    pub fn has_table_structure(&self) -> bool {
        if self.tokens.len() < MIN_TABLE_TOKENS {
            return false;
        }
        let mut rows: BTreeMap<i64, usize> = BTreeMap::new();
        for token in self.tokens.iter().filter(|t| !t.text.trim().is_empty()) {
            let key = ((token.rect.y0 / ROW_TOLERANCE_PX).round_ties_even() * ROW_TOLERANCE_PX) as i64;
            *rows.entry(key).or_default() += 1;
        }
        rows.len() >= 2 && rows.values().any(|&n| n >= 2)
    }
}

/// Recognise text in an encoded image.
pub trait LineRecognizer: Send + Sync {
    fn recognize(&self, image: &[u8]) -> Result<OcrOutput, PageError>;
}

// ── Tesseract ────────────────────────────────────────────────────────────

/// Runs the `tesseract` CLI with page segmentation mode 6 (one uniform text
/// block) and parses its TSV output.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    command: String,
    language: String,
}

impl TesseractRecognizer {
    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }
}

impl LineRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &[u8]) -> Result<OcrOutput, PageError> {
        let png = grayscale_png(image).map_err(|e| PageError::RecognitionFailed {
            detail: format!("image decode failed: {e}"),
        })?;

        let mut child = Command::new(&self.command)
            .args(["stdin", "stdout", "-l", &self.language, "--psm", "6", "tsv"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PageError::RecognitionFailed {
                detail: if e.kind() == ErrorKind::NotFound {
                    format!("'{}' not found on PATH", self.command)
                } else {
                    format!("failed to start '{}': {e}", self.command)
                },
            })?;

        // Dropping stdin closes the pipe so tesseract sees EOF.
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&png)
                .map_err(|e| PageError::RecognitionFailed {
                    detail: format!("writing image to tesseract: {e}"),
                })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| PageError::RecognitionFailed {
                detail: format!("waiting for tesseract: {e}"),
            })?;
        if !output.status.success() {
            return Err(PageError::RecognitionFailed {
                detail: format!(
                    "tesseract exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let parsed = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        debug!(
            "tesseract: {} tokens, {} lines",
            parsed.tokens.len(),
            parsed.line_count()
        );
        Ok(parsed)
    }
}

/// Parse tesseract TSV output.
///
/// Columns: `level page_num block_num par_num line_num word_num left top
/// width height conf text`. Every data row becomes a token; word rows
/// (level 5) are also joined into lines keyed by `(page, block, par, line)`.
pub fn parse_tsv(tsv: &str) -> OcrOutput {
    let mut tokens = Vec::new();
    let mut lines: Vec<((u32, u32, u32, u32), Vec<String>)> = Vec::new();

    for row in tsv.lines() {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 11 || cols[0] == "level" {
            continue;
        }
        let num = |i: usize| cols[i].trim().parse::<f32>().unwrap_or(0.0);
        let id = |i: usize| cols[i].trim().parse::<u32>().unwrap_or(0);
        let text = cols.get(11).map(|t| t.trim()).unwrap_or("").to_string();
        let confidence = cols[10]
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|c| *c >= 0.0);

        let (left, top) = (num(6), num(7));
        tokens.push(OcrToken {
            text: text.clone(),
            rect: Rect::new(left, top, left + num(8), top + num(9)),
            confidence,
        });

        if id(0) == 5 && !text.is_empty() {
            let key = (id(1), id(2), id(3), id(4));
            match lines.last_mut() {
                Some((k, words)) if *k == key => words.push(text),
                _ => lines.push((key, vec![text])),
            }
        }
    }

    let text = lines
        .into_iter()
        .map(|(_, words)| words.join(" "))
        .collect::<Vec<_>>()
        .join("\n");
    OcrOutput { text, tokens }
}
