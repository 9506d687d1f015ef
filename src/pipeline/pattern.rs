//! Digit-wildcard patterns shared by detection, redaction and text filtering.
//!
//! Fuzzy detection emits patterns in which every run of digits was replaced
//! by `#` ("Page #"). A [`PatternSet`] matches a candidate line against a
//! list of such patterns using three tiers, in order:
//!
//! 1. exact equality;
//! 2. wildcard full-match, where `#` stands for one or more digits and every
//!    other character is literal;
//! 3. similarity ratio ≥ [`REDACTION_SIMILARITY`].

use crate::pipeline::similarity::ratio;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Minimum similarity for the fuzzy tier of [`PatternSet::matches`].
pub const REDACTION_SIMILARITY: f64 = 0.90;

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// Replace every run of digits with a single `#`.
pub fn normalize_digits(text: &str) -> String {
    DIGIT_RUN.replace_all(text, "#").into_owned()
}

/// Compile a wildcard pattern into an anchored regex.
///
/// Returns `None` only when the compiled program would exceed the regex
/// size limit.
pub fn wildcard_regex(pattern: &str) -> Option<Regex> {
    let body = pattern
        .split('#')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\d+");
    match Regex::new(&format!("^(?:{body})$")) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Pattern {:?} not usable as wildcard: {}", pattern, e);
            None
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    text: String,
    wildcard: Option<Regex>,
}

/// A compiled list of header and footer patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<CompiledPattern>,
}

impl PatternSet {
    /// Compile `headers` followed by `footers`. Empty patterns are dropped.
    pub fn new<S: AsRef<str>>(headers: &[S], footers: &[S]) -> Self {
        let patterns = headers
            .iter()
            .chain(footers.iter())
            .map(|p| p.as_ref())
            .filter(|p| !p.is_empty())
            .map(|p| CompiledPattern {
                text: p.to_string(),
                wildcard: if p.contains('#') { wildcard_regex(p) } else { None },
            })
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether `text` (already trimmed by the caller) matches any pattern.
    pub fn matches(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        self.patterns.iter().any(|p| {
            p.text == text
                || p.wildcard.as_ref().is_some_and(|re| re.is_match(text))
                || ratio(&p.text, text) >= REDACTION_SIMILARITY
        })
    }
}
