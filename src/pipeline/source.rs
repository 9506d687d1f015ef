//! Positional content model and the collaborator traits the engines read
//! and write through.
//!
//! The detection, classification and extraction engines never touch pdfium
//! directly. They consume a [`BlockSource`] (read side) and redaction writes
//! through a [`RedactionSurface`]. [`crate::pipeline::pdf::PdfiumDocument`]
//! implements both over a real file; [`MemoryDocument`] implements both over
//! pre-extracted content and is what the test-suite drives.
//!
//! All coordinates are PDF points in a top-down frame: `y0` is the distance
//! from the top edge of the page to the top of the box.

use crate::error::PageError;
use crate::pipeline::extract::{detect_direction, TextDirection};
use serde::{Deserialize, Serialize};

/// Maximum horizontal gap, in points, between two spans merged into one block.
pub const BLOCK_GAP_PT: f32 = 20.0;

/// Vertical tolerance, in points, for two spans to share a visual line.
pub const LINE_TOLERANCE_PT: f32 = 3.0;

// ── Geometry ─────────────────────────────────────────────────────────────

/// Axis-aligned box in top-down page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() as f64 * self.height() as f64
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }
}

// ── Page content ─────────────────────────────────────────────────────────

/// One positioned text unit, `(x0, y0, x1, y1, text)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PageBlock {
    pub rect: Rect,
    pub text: String,
}

impl PageBlock {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32, text: impl Into<String>) -> Self {
        Self {
            rect: Rect::new(x0, y0, x1, y1),
            text: text.into(),
        }
    }
}

/// A run of text with its font size, used for Markdown heading inference.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x0: f32,
    pub top: f32,
    pub text: String,
    /// `None` when the source cannot report a size.
    pub font_size: Option<f32>,
}

/// One embedded image occurrence on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    /// Stable identifier of the image within its page.
    pub reference: u32,
    /// Placements of the image on the page; the first is authoritative.
    pub rects: Vec<Rect>,
    /// Encoded image bytes (PNG, JPEG). Empty when the stream was unreadable.
    pub bytes: Vec<u8>,
}

/// The smallest redactable unit of text on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub rect: Rect,
    pub text: String,
}

// ── Collaborator traits ──────────────────────────────────────────────────

/// Read access to a document's positioned content.
///
/// Page indices are 0-based. Per-page failures are reported as
/// [`PageError`] so callers can skip the page and keep going.
pub trait BlockSource {
    fn page_count(&self) -> usize;

    fn page_size(&self, page: usize) -> Result<PageSize, PageError>;

    fn page_blocks(&self, page: usize) -> Result<Vec<PageBlock>, PageError>;

    fn page_text(&self, page: usize) -> Result<String, PageError>;

    fn page_images(&self, page: usize) -> Result<Vec<PageImage>, PageError>;

    fn page_runs(&self, page: usize) -> Result<Vec<TextRun>, PageError>;
}

/// Write access for overlay redaction.
pub trait RedactionSurface: BlockSource {
    /// Redactable spans of a page, in content order.
    fn page_spans(&self, page: usize) -> Result<Vec<TextSpan>, PageError>;

    /// Paint an opaque white rectangle over `rect`.
    fn cover(&mut self, page: usize, rect: Rect) -> Result<(), PageError>;
}

// ── Span → block assembly ────────────────────────────────────────────────

/// Merge spans that sit on the same visual line and are horizontally close
/// into blocks. Right-to-left lines are joined in reading order.
pub fn merge_spans_into_blocks(spans: &[TextSpan]) -> Vec<PageBlock> {
    let mut sorted: Vec<&TextSpan> = spans.iter().filter(|s| !s.text.trim().is_empty()).collect();
    sorted.sort_by(|a, b| a.rect.y0.total_cmp(&b.rect.y0));

    // Cluster into visual lines against each line's first baseline.
    let mut lines: Vec<(f32, Vec<&TextSpan>)> = Vec::new();
    for span in sorted {
        match lines.last_mut() {
            Some((line_y0, members)) if (span.rect.y0 - *line_y0).abs() <= LINE_TOLERANCE_PT => {
                members.push(span)
            }
            _ => lines.push((span.rect.y0, vec![span])),
        }
    }

    let mut blocks = Vec::new();
    for (_, mut members) in lines {
        members.sort_by(|a, b| a.rect.x0.total_cmp(&b.rect.x0));
        let mut groups: Vec<(Rect, Vec<&TextSpan>)> = Vec::new();
        for span in members {
            match groups.last_mut() {
                Some((rect, group)) if span.rect.x0 - rect.x1 <= BLOCK_GAP_PT => {
                    *rect = rect.union(&span.rect);
                    group.push(span);
                }
                _ => groups.push((span.rect, vec![span])),
            }
        }
        blocks.extend(groups.into_iter().map(|(rect, group)| PageBlock {
            rect,
            text: join_in_reading_order(group.iter().map(|s| s.text.trim()).collect()),
        }));
    }
    blocks
}

/// Fold repeated placements of the same image stream into one entry.
///
/// Entries with identical non-empty bytes collapse onto the first one seen,
/// which keeps its reference; later placements are appended to its `rects`.
/// Unreadable (empty) streams are never merged.
pub fn group_placements(images: Vec<PageImage>) -> Vec<PageImage> {
    let mut grouped: Vec<PageImage> = Vec::with_capacity(images.len());
    for image in images {
        let existing = grouped
            .iter_mut()
            .find(|seen| !image.bytes.is_empty() && seen.bytes == image.bytes);
        match existing {
            Some(seen) => seen.rects.extend(image.rects),
            None => grouped.push(image),
        }
    }
    grouped
}

/// Join left-to-right sorted parts, reversing them when the line is RTL.
pub(crate) fn join_in_reading_order(mut parts: Vec<&str>) -> String {
    let joined = parts.join(" ");
    if parts.len() > 1 && detect_direction(&joined) == TextDirection::Rtl {
        parts.reverse();
        return parts.join(" ");
    }
    joined
}

// ── In-memory document ───────────────────────────────────────────────────

/// One page of a [`MemoryDocument`].
#[derive(Debug, Clone)]
pub struct MemoryPage {
    pub size: PageSize,
    pub blocks: Vec<PageBlock>,
    pub images: Vec<PageImage>,
    pub runs: Vec<TextRun>,
    /// Overlays painted by redaction, in order.
    pub covers: Vec<Rect>,
    /// When set, every read of this page fails.
    pub unreadable: bool,
}

impl MemoryPage {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            size: PageSize { width, height },
            blocks: Vec::new(),
            images: Vec::new(),
            runs: Vec::new(),
            covers: Vec::new(),
            unreadable: false,
        }
    }

    pub fn block(mut self, x0: f32, y0: f32, x1: f32, y1: f32, text: impl Into<String>) -> Self {
        self.blocks.push(PageBlock::new(x0, y0, x1, y1, text));
        self
    }

    pub fn image(mut self, reference: u32, rect: Rect, bytes: impl Into<Vec<u8>>) -> Self {
        self.images.push(PageImage {
            reference,
            rects: vec![rect],
            bytes: bytes.into(),
        });
        self
    }

    pub fn run(mut self, x0: f32, top: f32, text: impl Into<String>, font_size: f32) -> Self {
        self.runs.push(TextRun {
            x0,
            top,
            text: text.into(),
            font_size: Some(font_size),
        });
        self
    }

    pub fn unreadable(mut self) -> Self {
        self.unreadable = true;
        self
    }
}

/// A [`BlockSource`] and [`RedactionSurface`] over content held in memory.
///
/// Page text is the block texts joined by newlines. Redactable spans are the
/// blocks themselves. When a page has no explicit runs, its blocks are
/// exposed as runs without a font size.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    pages: Vec<MemoryPage>,
}

impl MemoryDocument {
    pub fn new(pages: Vec<MemoryPage>) -> Self {
        Self { pages }
    }

    pub fn push(&mut self, page: MemoryPage) {
        self.pages.push(page);
    }

    pub fn pages(&self) -> &[MemoryPage] {
        &self.pages
    }

    /// Overlays painted on `page` so far.
    pub fn covers(&self, page: usize) -> &[Rect] {
        self.pages.get(page).map(|p| p.covers.as_slice()).unwrap_or(&[])
    }

    fn readable(&self, page: usize) -> Result<&MemoryPage, PageError> {
        match self.pages.get(page) {
            Some(p) if !p.unreadable => Ok(p),
            Some(_) => Err(PageError::BlocksUnavailable {
                page,
                detail: "page content stream is unreadable".into(),
            }),
            None => Err(PageError::BlocksUnavailable {
                page,
                detail: format!("page index out of range (document has {} pages)", self.pages.len()),
            }),
        }
    }
}

impl BlockSource for MemoryDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, page: usize) -> Result<PageSize, PageError> {
        self.readable(page).map(|p| p.size)
    }

    fn page_blocks(&self, page: usize) -> Result<Vec<PageBlock>, PageError> {
        self.readable(page).map(|p| p.blocks.clone())
    }

    fn page_text(&self, page: usize) -> Result<String, PageError> {
        let p = self.readable(page)?;
        Ok(p.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn page_images(&self, page: usize) -> Result<Vec<PageImage>, PageError> {
        self.readable(page).map(|p| p.images.clone())
    }

    fn page_runs(&self, page: usize) -> Result<Vec<TextRun>, PageError> {
        let p = self.readable(page)?;
        if !p.runs.is_empty() {
            return Ok(p.runs.clone());
        }
        Ok(p.blocks
            .iter()
            .map(|b| TextRun {
                x0: b.rect.x0,
                top: b.rect.y0,
                text: b.text.clone(),
                font_size: None,
            })
            .collect())
    }
}

impl RedactionSurface for MemoryDocument {
    fn page_spans(&self, page: usize) -> Result<Vec<TextSpan>, PageError> {
        let p = self.readable(page)?;
        Ok(p.blocks
            .iter()
            .map(|b| TextSpan {
                rect: b.rect,
                text: b.text.clone(),
            })
            .collect())
    }

    fn cover(&mut self, page: usize, rect: Rect) -> Result<(), PageError> {
        let total = self.pages.len();
        let p = self
            .pages
            .get_mut(page)
            .ok_or_else(|| PageError::RedactionFailed {
                page,
                detail: format!("page index out of range (document has {total} pages)"),
            })?;
        p.covers.push(rect);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(x0: f32, y0: f32, x1: f32, text: &str) -> TextSpan {
        TextSpan {
            rect: Rect::new(x0, y0, x1, y0 + 10.0),
            text: text.into(),
        }
    }

    #[test]
    fn rect_geometry() {
        let r = Rect::new(10.0, 20.0, 30.0, 60.0);
        assert_eq!(r.width(), 20.0);
        assert_eq!(r.height(), 40.0);
        assert_eq!(r.area(), 800.0);
        let inverted = Rect::new(30.0, 60.0, 10.0, 20.0);
        assert_eq!(inverted.area(), 0.0);
    }

    #[test]
    fn spans_on_one_line_merge() {
        let blocks = merge_spans_into_blocks(&[
            span(50.0, 20.0, 100.0, "Annual"),
            span(105.0, 21.0, 150.0, "Report"),
        ]);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "Annual Report");
        assert_eq!(blocks[0].rect.x0, 50.0);
        assert_eq!(blocks[0].rect.x1, 150.0);
    }

    #[test]
    fn baseline_jitter_does_not_fuse_distant_spans() {
        let blocks = merge_spans_into_blocks(&[
            span(50.0, 21.0, 200.0, "ANNUAL REPORT"),
            span(500.0, 20.0, 540.0, "Page 3"),
        ]);
        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["ANNUAL REPORT", "Page 3"]);
        assert_eq!(blocks[0].rect.x1, 200.0);
        assert_eq!(blocks[1].rect.x0, 500.0);
    }

    #[test]
    fn jittered_running_title_is_detected_across_pages() {
        use crate::config::DetectionSettings;
        use crate::pipeline::detect::detect;

        let mut pages = Vec::new();
        for i in 0..20 {
            let jitter = if i % 2 == 0 { 1.0 } else { 0.0 };
            let mut spans = vec![
                span(50.0, 20.0 + jitter, 200.0, "ANNUAL REPORT"),
                span(500.0, 20.0, 540.0, &format!("Page {}", i + 1)),
                span(50.0, 400.0, 300.0, &format!("Body paragraph {}", i * 13)),
            ];
            if i % 3 == 0 {
                spans.swap(0, 1);
            }
            let mut page = MemoryPage::new(595.0, 842.0);
            page.blocks = merge_spans_into_blocks(&spans);
            pages.push(page);
        }
        let doc = MemoryDocument::new(pages);

        let result = detect(&doc, &DetectionSettings::default());
        assert!(result.headers.contains(&"ANNUAL REPORT".to_string()), "{result:?}");
    }

    #[test]
    fn repeated_image_stream_is_one_image() {
        let placed = |reference: u32, x0: f32, bytes: &[u8]| PageImage {
            reference,
            rects: vec![Rect::new(x0, 10.0, x0 + 20.0, 30.0)],
            bytes: bytes.to_vec(),
        };
        let grouped = group_placements(vec![
            placed(2, 40.0, b"rule"),
            placed(3, 300.0, b"chart"),
            placed(5, 500.0, b"rule"),
            placed(6, 10.0, b""),
            placed(7, 90.0, b""),
        ]);

        let references: Vec<u32> = grouped.iter().map(|i| i.reference).collect();
        assert_eq!(references, vec![2, 3, 6, 7]);
        assert_eq!(
            grouped[0].rects,
            vec![Rect::new(40.0, 10.0, 60.0, 30.0), Rect::new(500.0, 10.0, 520.0, 30.0)]
        );
    }

    #[test]
    fn wide_gap_starts_new_block() {
        let blocks = merge_spans_into_blocks(&[
            span(50.0, 20.0, 100.0, "Left title"),
            span(400.0, 20.0, 450.0, "Page 3"),
        ]);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].text, "Page 3");
    }

    #[test]
    fn separate_lines_stay_separate() {
        let blocks = merge_spans_into_blocks(&[
            span(50.0, 100.0, 100.0, "second"),
            span(50.0, 20.0, 100.0, "first"),
        ]);
        let texts: Vec<_> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn rtl_line_joins_in_reading_order() {
        // Visually left-to-right: "المالية" then "المعايير"; read right-to-left.
        let blocks = merge_spans_into_blocks(&[
            span(50.0, 20.0, 100.0, "المالية"),
            span(105.0, 20.0, 160.0, "المعايير"),
        ]);
        assert_eq!(blocks[0].text, "المعايير المالية");
    }

    #[test]
    fn memory_document_reads_and_covers() {
        let mut doc = MemoryDocument::new(vec![
            MemoryPage::new(600.0, 800.0).block(10.0, 10.0, 200.0, 20.0, "Header"),
            MemoryPage::new(600.0, 800.0).unreadable(),
        ]);
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.page_text(0).unwrap(), "Header");
        assert!(doc.page_blocks(1).is_err());
        assert!(doc.page_blocks(7).is_err());

        let runs = doc.page_runs(0).unwrap();
        assert_eq!(runs[0].font_size, None);

        doc.cover(0, Rect::new(0.0, 0.0, 5.0, 5.0)).unwrap();
        assert_eq!(doc.covers(0).len(), 1);
        assert!(doc.cover(9, Rect::new(0.0, 0.0, 1.0, 1.0)).is_err());
    }
}
