//! Overlay redaction.
//!
//! Matching text spans and decorative images are covered with opaque white
//! rectangles. The underlying content stays in the file; text extraction
//! filters header/footer lines separately.
//!
//! Only images labelled [`ImageClass::Decorative`] are ever covered, even if
//! a caller passes other records in.

use crate::error::PageError;
use crate::pipeline::classify::{ImageClass, ImageRecord};
use crate::pipeline::pattern::PatternSet;
use crate::pipeline::source::RedactionSurface;
use serde::{Deserialize, Serialize};
use std::ops::Add;
use tracing::{debug, info, warn};

/// How many overlays were painted, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionLog {
    pub text_spans: usize,
    pub images: usize,
}

impl RedactionLog {
    pub fn total(&self) -> usize {
        self.text_spans + self.images
    }
}

impl Add for RedactionLog {
    type Output = RedactionLog;

    fn add(self, rhs: Self) -> Self {
        RedactionLog {
            text_spans: self.text_spans + rhs.text_spans,
            images: self.images + rhs.images,
        }
    }
}

/// Cover every span matching a header/footer pattern. Returns the number of
/// spans covered.
pub fn redact_text(surface: &mut dyn RedactionSurface, patterns: &PatternSet) -> usize {
    if patterns.is_empty() {
        debug!("No header/footer patterns; nothing to redact");
        return 0;
    }
    let total = (0..surface.page_count()).fold(0, |count, page| {
        count + redact_page(surface, page, patterns).unwrap_or_else(|e| {
            warn!("{}", e);
            0
        })
    });
    info!("Redacted {} header/footer spans", total);
    total
}

fn redact_page(
    surface: &mut dyn RedactionSurface,
    page: usize,
    patterns: &PatternSet,
) -> Result<usize, PageError> {
    let spans = surface.page_spans(page)?;
    let mut covered = 0;
    for span in spans.iter().filter(|s| patterns.matches(s.text.trim())) {
        match surface.cover(page, span.rect) {
            Ok(()) => covered += 1,
            Err(e) => warn!("{}", e),
        }
    }
    Ok(covered)
}

/// Cover the placement of each decorative image. Returns the number covered.
pub fn redact_images(surface: &mut dyn RedactionSurface, decorative: &[ImageRecord]) -> usize {
    let covered = decorative
        .iter()
        .filter(|record| {
            let ok = record.classification == ImageClass::Decorative;
            if !ok {
                warn!(
                    "Refusing to remove {} image {} on page {}",
                    record.classification, record.reference, record.page
                );
            }
            ok
        })
        .filter_map(|record| record.rect.map(|rect| (record, rect)))
        .filter(|(record, rect)| match surface.cover(record.page, *rect) {
            Ok(()) => true,
            Err(e) => {
                warn!("Error removing image {} on page {}: {}", record.reference, record.page, e);
                false
            }
        })
        .count();
    info!("Removed {} decorative images", covered);
    covered
}

/// Apply both kinds of redaction to one surface.
pub fn apply(
    surface: &mut dyn RedactionSurface,
    patterns: &PatternSet,
    decorative: &[ImageRecord],
    remove_decorative: bool,
) -> RedactionLog {
    let text_spans = redact_text(surface, patterns);
    let images = if remove_decorative {
        redact_images(surface, decorative)
    } else {
        info!("Image removal disabled in config");
        0
    };
    RedactionLog { text_spans, images }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::source::{MemoryDocument, MemoryPage, Rect};

    fn record(page: usize, class: ImageClass, rect: Option<Rect>) -> ImageRecord {
        ImageRecord {
            page,
            reference: 1,
            rect,
            area_percentage: 0.01,
            ocr_lines: 0,
            ocr_confidence: 0.0,
            has_table_structure: false,
            classification: class,
            reason: String::new(),
            ocr_text_sample: String::new(),
            error: None,
        }
    }

    #[test]
    fn covers_matching_spans_only() {
        let mut doc = MemoryDocument::new(vec![
            MemoryPage::new(600.0, 800.0)
                .block(50.0, 20.0, 300.0, 32.0, "ANNUAL REPORT")
                .block(50.0, 400.0, 500.0, 412.0, "Body text")
                .block(280.0, 770.0, 320.0, 782.0, "Page 1"),
            MemoryPage::new(600.0, 800.0).unreadable(),
        ]);
        let set = PatternSet::new(&["ANNUAL REPORT"], &["Page #"]);
        assert_eq!(redact_text(&mut doc, &set), 2);
        assert_eq!(doc.covers(0).len(), 2);
        assert!(doc.covers(1).is_empty());
    }

    #[test]
    fn only_decorative_images_are_covered() {
        let rect = Rect::new(10.0, 10.0, 20.0, 20.0);
        let mut doc = MemoryDocument::new(vec![MemoryPage::new(600.0, 800.0)]);
        let records = vec![
            record(0, ImageClass::Decorative, Some(rect)),
            record(0, ImageClass::Table, Some(rect)),
            record(0, ImageClass::Decorative, None),
            record(5, ImageClass::Decorative, Some(rect)),
        ];
        assert_eq!(redact_images(&mut doc, &records), 1);
        assert_eq!(doc.covers(0), &[rect]);
    }

    #[test]
    fn removal_can_be_disabled() {
        let rect = Rect::new(10.0, 10.0, 20.0, 20.0);
        let mut doc = MemoryDocument::new(vec![MemoryPage::new(600.0, 800.0)]);
        let log = apply(
            &mut doc,
            &PatternSet::default(),
            &[record(0, ImageClass::Decorative, Some(rect))],
            false,
        );
        assert_eq!(log, RedactionLog::default());
        assert_eq!(log.total(), 0);
    }
}
