//! Plain-text extraction: header/footer line filtering, direction detection,
//! Unicode normalisation and the retrieval chunk simulation.
//!
//! Overlay redaction leaves the covered text in the content stream, so the
//! extractor filters matching lines itself using the same [`PatternSet`] the
//! redaction step used.

use crate::config::{Normalization, TextSettings};
use crate::pipeline::pattern::PatternSet;
use crate::pipeline::source::BlockSource;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;

/// Dominant writing direction of a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    Rtl,
    Ltr,
}

// ── Direction ────────────────────────────────────────────────────────────

/// Combining marks inside the RTL blocks. They carry no direction.
fn is_rtl_mark(c: char) -> bool {
    matches!(c as u32,
        0x0591..=0x05C7
        | 0x0610..=0x061A
        | 0x064B..=0x065F
        | 0x0670
        | 0x06D6..=0x06ED
    )
}

/// Strong right-to-left letter (Hebrew, Arabic, Syriac, Thaana, NKo and the
/// Arabic presentation forms).
fn is_rtl_letter(c: char) -> bool {
    let in_block = matches!(c as u32,
        0x0590..=0x08FF
        | 0xFB1D..=0xFDFF
        | 0xFE70..=0xFEFF
        | 0x10800..=0x10FFF
        | 0x1E800..=0x1EFFF
    );
    in_block && c.is_alphabetic() && !is_rtl_mark(c)
}

/// Majority vote of strong RTL letters against other alphabetic characters.
/// Ties go to LTR.
pub fn detect_direction(text: &str) -> TextDirection {
    let (rtl, ltr) = text.chars().fold((0usize, 0usize), |(rtl, ltr), c| {
        if is_rtl_letter(c) {
            (rtl + 1, ltr)
        } else if c.is_alphabetic() && !is_rtl_mark(c) {
            (rtl, ltr + 1)
        } else {
            (rtl, ltr)
        }
    });
    if rtl > ltr {
        TextDirection::Rtl
    } else {
        TextDirection::Ltr
    }
}

// ── Normalisation and filtering ──────────────────────────────────────────

pub fn normalize(text: &str, form: Normalization) -> String {
    match form {
        Normalization::Nfc => text.nfc().collect(),
        Normalization::Nfd => text.nfd().collect(),
        Normalization::Nfkc => text.nfkc().collect(),
        Normalization::Nfkd => text.nfkd().collect(),
        Normalization::None => text.to_string(),
    }
}

/// Drop every line whose trimmed text matches a header/footer pattern.
pub fn strip_pattern_lines(text: &str, patterns: &PatternSet) -> String {
    if patterns.is_empty() || text.is_empty() {
        return text.to_string();
    }
    text.split('\n')
        .filter(|line| !patterns.matches(line.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Extraction ───────────────────────────────────────────────────────────

/// Result of [`extract_text`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    /// Page texts joined by a blank line.
    pub text: String,
    pub page_texts: Vec<String>,
    pub total_pages: usize,
    /// 0-based indices of pages whose text is mostly right-to-left.
    pub rtl_pages: Vec<usize>,
    pub ltr_pages: Vec<usize>,
}

/// Extract every page's text, filter header/footer lines, classify direction
/// and normalise. Unreadable pages contribute an empty string.
pub fn extract_text(
    source: &dyn BlockSource,
    patterns: &PatternSet,
    settings: &TextSettings,
) -> ExtractedText {
    let total = source.page_count();
    let mut page_texts = Vec::with_capacity(total);
    let mut rtl_pages = Vec::new();
    let mut ltr_pages = Vec::new();

    for page in 0..total {
        let raw = source.page_text(page).unwrap_or_else(|e| {
            warn!("{}", e);
            String::new()
        });
        let filtered = strip_pattern_lines(&raw, patterns);

        let direction = if settings.auto_detect_direction {
            detect_direction(&filtered)
        } else {
            TextDirection::Ltr
        };
        match direction {
            TextDirection::Rtl => rtl_pages.push(page),
            TextDirection::Ltr => ltr_pages.push(page),
        }

        page_texts.push(normalize(&filtered, settings.normalization));
    }

    let text = page_texts.join("\n\n");
    info!(
        "Extracted {} characters from {} pages ({} RTL, {} LTR)",
        text.chars().count(),
        total,
        rtl_pages.len(),
        ltr_pages.len()
    );

    ExtractedText {
        text,
        page_texts,
        total_pages: total,
        rtl_pages,
        ltr_pages,
    }
}

// ── Chunk simulation ─────────────────────────────────────────────────────

/// Greedy word packing into chunks of at most `chunk_size` characters, each
/// word costing its length plus one separator. A single oversized word still
/// gets its own chunk.
pub fn chunk_simulation(text: &str, chunk_size: usize) -> Vec<String> {
    let (mut chunks, last, _) = text.split_whitespace().fold(
        (Vec::new(), Vec::<&str>::new(), 0usize),
        |(mut chunks, mut current, size), word| {
            let cost = word.chars().count() + 1;
            if size + cost > chunk_size && !current.is_empty() {
                chunks.push(current.join(" "));
                current.clear();
                current.push(word);
                (chunks, current, cost)
            } else {
                current.push(word);
                (chunks, current, size + cost)
            }
        },
    );
    if !last.is_empty() {
        chunks.push(last.join(" "));
    }
    debug!("Chunk simulation produced {} chunks", chunks.len());
    chunks
}

/// Render chunks as `=== CHUNK i/n ===` blocks.
pub fn render_chunk_simulation(chunks: &[String]) -> String {
    let total = chunks.len();
    chunks
        .iter()
        .enumerate()
        .fold(String::new(), |mut out, (i, chunk)| {
            let _ = write!(out, "=== CHUNK {}/{} ===\n{}\n\n", i + 1, total, chunk);
            out
        })
}
