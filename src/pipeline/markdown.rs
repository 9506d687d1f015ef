//! Markdown structuring and Quranic-font noise removal.
//!
//! Text runs are grouped into visual lines, each line is labelled H1, H2 or
//! body from its average font size, and Latin-letter noise produced by
//! broken Quranic fonts is replaced with a placeholder. The assembled
//! Markdown then goes through a fixed sequence of cleanup rules.
//!
//! ## Noise rules
//!
//! 1. Runs of three or more spaced capital letters (`U T S R`) are noise
//!    unless the letters spell a known term.
//! 2. Each Latin word of 2–15 letters is kept when it is a known term
//!    (counted as preserved), or when it has a vowel and fewer than 80%
//!    consonants. Otherwise it is noise if Arabic appears within 10
//!    characters on either side.
//! 3. Adjacent placeholders collapse to one.

use crate::config::TextSettings;
use crate::pipeline::source::{join_in_reading_order, BlockSource, TextRun};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Add;
use tracing::{info, warn};

/// Font size assumed for runs that report none.
pub const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Vertical tolerance for runs on the same line, in points.
pub const LINE_Y_TOLERANCE: f32 = 3.0;

/// Arabic characters within this many characters mark a Latin word as noise.
const ARABIC_CONTEXT_CHARS: usize = 10;

static VALID_TERMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Islamic finance
        "SUKUK", "MURABAHA", "MUSHARAKA", "MUDARABA", "IJARA", "ISTISNA", "SALAM", "TAKAFUL",
        "WADIAH", "QARD", "WAKALAH", "HIBAH", "SHARIA", "SHARIAH", "FIQH", "HALAL", "HARAM",
        "RIBA",
        // Finance
        "SWAPS", "OPTIONS", "DERIVATIVES", "BONDS", "EQUITY", "DEBT", "ASSETS", "LIABILITIES",
        "CAPITAL", "PROFIT", "LOSS", "REVENUE", "ACCOUNTING", "FINANCIAL", "AUDIT",
        "COMPLIANCE", "RISK", "INVESTMENT", "FINANCING", "LEASE", "SALE", "PURCHASE",
        // Organisations
        "AAOIFI", "IFSB", "IIFM", "ISRA", "CIBAFI", "IDB", "IRTI",
        // Abbreviations
        "FAS", "GSIFI", "IAS", "IFRS", "USD", "EUR", "GBP", "SAR", "CEO", "CFO", "CRO", "GDP",
        "ROA", "ROE", "NPV", "IRR",
    ]
    .into_iter()
    .collect()
});

static RE_SPACED_CAPITALS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]\s+[A-Z]\s+[A-Z](?:\s+[A-Z])*\b").unwrap());

static RE_LATIN_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Za-z]{2,15}\b").unwrap());

// ── Statistics ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseStats {
    pub quranic_sequences_removed: usize,
    pub english_terms_preserved: usize,
}

impl Add for NoiseStats {
    type Output = NoiseStats;

    fn add(self, rhs: Self) -> Self {
        NoiseStats {
            quranic_sequences_removed: self.quranic_sequences_removed
                + rhs.quranic_sequences_removed,
            english_terms_preserved: self.english_terms_preserved + rhs.english_terms_preserved,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureInfo {
    pub h1_count: usize,
    pub h2_count: usize,
    pub body_count: usize,
}

/// Output of [`structure_document`].
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredText {
    pub markdown: String,
    pub plain: String,
    pub structure: StructureInfo,
    pub cleaning: NoiseStats,
}

// ── Noise cleaner ────────────────────────────────────────────────────────

/// What to do with one regex match.
enum Verdict {
    Keep,
    Preserve,
    Replace,
}

/// Replace matches of `re` according to `judge`, counting replacements and
/// preserved terms.
fn substitute(
    text: &str,
    re: &Regex,
    placeholder: &str,
    judge: impl Fn(&str, usize, usize) -> Verdict,
) -> (String, NoiseStats) {
    let (mut out, last, stats) = re.find_iter(text).fold(
        (String::with_capacity(text.len()), 0usize, NoiseStats::default()),
        |(mut out, last, stats), m| {
            out.push_str(&text[last..m.start()]);
            let delta = match judge(m.as_str(), m.start(), m.end()) {
                Verdict::Keep => {
                    out.push_str(m.as_str());
                    NoiseStats::default()
                }
                Verdict::Preserve => {
                    out.push_str(m.as_str());
                    NoiseStats {
                        english_terms_preserved: 1,
                        ..NoiseStats::default()
                    }
                }
                Verdict::Replace => {
                    out.push_str(placeholder);
                    NoiseStats {
                        quranic_sequences_removed: 1,
                        ..NoiseStats::default()
                    }
                }
            };
            (out, m.end(), stats + delta)
        },
    );
    out.push_str(&text[last..]);
    (out, stats)
}

fn is_arabic(c: char) -> bool {
    ('\u{0600}'..='\u{06FF}').contains(&c)
}

/// Removes Latin-letter artefacts of broken Quranic fonts.
#[derive(Debug, Clone)]
pub struct NoiseCleaner {
    placeholder: String,
    repeated: Option<Regex>,
    padded: Option<Regex>,
}

impl NoiseCleaner {
    pub fn new(placeholder: impl Into<String>) -> Self {
        let placeholder = placeholder.into();
        let escaped = regex::escape(&placeholder);
        let compile = |pattern: String| match Regex::new(&pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("Placeholder cleanup disabled: {}", e);
                None
            }
        };
        Self {
            repeated: compile(format!(r"{escaped}(?:\s*{escaped})+")),
            padded: compile(format!(r"\s+{escaped}\s+")),
            placeholder,
        }
    }

    pub fn clean(&self, text: &str) -> (String, NoiseStats) {
        let (text, spaced) = substitute(text, &RE_SPACED_CAPITALS, &self.placeholder, |m, _, _| {
            let letters: String = m.chars().filter(|c| !c.is_whitespace()).collect();
            if VALID_TERMS.contains(letters.as_str()) {
                Verdict::Keep
            } else {
                Verdict::Replace
            }
        });

        let (text, words) = substitute(&text, &RE_LATIN_WORD, &self.placeholder, |m, start, end| {
            let word = m.to_ascii_uppercase();
            if VALID_TERMS.contains(word.as_str()) {
                return Verdict::Preserve;
            }
            let len = word.len();
            let vowels = word.chars().filter(|c| "AEIOU".contains(*c)).count();
            if vowels >= 1 && ((len - vowels) as f64 / len as f64) < 0.8 {
                return Verdict::Keep;
            }
            let before = text[..start].chars().rev().take(ARABIC_CONTEXT_CHARS);
            let after = text[end..].chars().take(ARABIC_CONTEXT_CHARS);
            if before.chain(after).any(is_arabic) {
                Verdict::Replace
            } else {
                Verdict::Keep
            }
        });

        let text = match &self.repeated {
            Some(re) => re.replace_all(&text, self.placeholder.as_str()).into_owned(),
            None => text,
        };
        let padded = format!(" {} ", self.placeholder);
        let text = match &self.padded {
            Some(re) => re.replace_all(&text, padded.as_str()).into_owned(),
            None => text,
        };

        (text, spaced + words)
    }
}

// ── Line grouping ────────────────────────────────────────────────────────

/// One visual line with the mean font size of its runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    pub font_size: f32,
}

/// Sort runs top-to-bottom and merge those within [`LINE_Y_TOLERANCE`] of
/// the line's first run.
pub fn group_runs_into_lines(runs: &[TextRun]) -> Vec<Line> {
    let mut sorted: Vec<&TextRun> = runs.iter().collect();
    sorted.sort_by(|a, b| a.top.total_cmp(&b.top).then(a.x0.total_cmp(&b.x0)));

    let mut groups: Vec<(f32, Vec<&TextRun>)> = Vec::new();
    for run in sorted {
        match groups.last_mut() {
            Some((y, members)) if (run.top - *y).abs() <= LINE_Y_TOLERANCE => members.push(run),
            _ => groups.push((run.top, vec![run])),
        }
    }

    groups
        .into_iter()
        .map(|(_, mut members)| {
            members.sort_by(|a, b| a.x0.total_cmp(&b.x0));
            let sizes: Vec<f32> = members.iter().filter_map(|r| r.font_size).collect();
            let font_size = if sizes.is_empty() {
                DEFAULT_FONT_SIZE
            } else {
                sizes.iter().sum::<f32>() / sizes.len() as f32
            };
            Line {
                text: join_in_reading_order(members.iter().map(|r| r.text.trim()).collect()),
                font_size,
            }
        })
        .collect()
}

// ── Document structuring ─────────────────────────────────────────────────

/// Build Markdown and plain text for the whole document.
pub fn structure_document(source: &dyn BlockSource, settings: &TextSettings) -> StructuredText {
    let cleaner = settings
        .remove_quranic_noise
        .then(|| NoiseCleaner::new(settings.quranic_placeholder.clone()));

    let mut markdown_lines = Vec::new();
    let mut plain_lines = Vec::new();
    let mut structure = StructureInfo::default();
    let mut cleaning = NoiseStats::default();

    for page in 0..source.page_count() {
        let runs = match source.page_runs(page) {
            Ok(runs) => runs,
            Err(e) => {
                warn!("Skipping page in Markdown output: {}", e);
                continue;
            }
        };
        for line in group_runs_into_lines(&runs) {
            let text = line.text.trim();
            if text.is_empty() {
                continue;
            }
            let text = match &cleaner {
                Some(c) => {
                    let (cleaned, stats) = c.clean(text);
                    cleaning = cleaning + stats;
                    cleaned
                }
                None => text.to_string(),
            };

            let prefix = if !settings.enable_markdown {
                ""
            } else if line.font_size >= settings.h1_font_size {
                "# "
            } else if line.font_size >= settings.h2_font_size {
                "## "
            } else {
                ""
            };
            match prefix {
                "# " => structure.h1_count += 1,
                "## " => structure.h2_count += 1,
                _ => structure.body_count += 1,
            }
            markdown_lines.push(format!("{prefix}{text}"));
            plain_lines.push(text);
        }
    }

    info!(
        "Structure: {} H1, {} H2, {} body paragraphs",
        structure.h1_count, structure.h2_count, structure.body_count
    );
    info!(
        "Cleaning: removed {} Quranic sequences, preserved {} English terms",
        cleaning.quranic_sequences_removed, cleaning.english_terms_preserved
    );

    StructuredText {
        markdown: clean_markdown(&markdown_lines.join("\n\n")),
        plain: plain_lines.join("\n\n"),
        structure,
        cleaning,
    }
}

// ── Cleanup rules ────────────────────────────────────────────────────────

/// Apply the cleanup rules, in order:
/// 1. Normalise line endings (CRLF → LF)
/// 2. Trim trailing whitespace per line
/// 3. Collapse 3+ consecutive blank lines down to 2
/// 4. Strip invisible characters (zero-width space, BOM, soft hyphen, word
///    joiner). ZWJ and ZWNJ shape Arabic-script text and stay.
/// 5. Ensure the file ends with exactly one newline
pub fn clean_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Trim trailing whitespace per line ────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 3: Collapse excessive blank lines ───────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 4: Remove invisible characters ──────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{2060}'], "")
}

// ── Rule 5: Ensure file ends with single newline ─────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}
