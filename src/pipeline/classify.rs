//! Table-protecting image classification.
//!
//! Every embedded image is OCR'd and run through an ordered rule list. The
//! first matching rule decides. Rules that protect content come first, so an
//! image is only ever labelled decorative when it is small, has no text and
//! no earlier rule claimed it.
//!
//! | # | Rule                                       | Label       |
//! |---|--------------------------------------------|-------------|
//! | 1 | OCR tokens form a grid                     | table       |
//! | 2 | OCR lines ≥ `min_lines_for_table`          | table       |
//! | 3 | any OCR line and more than 10 chars        | important   |
//! | 4 | area > 20% of page                         | important   |
//! | 5 | area > 10% of page                         | important   |
//! | 6 | area < `area_threshold` and no OCR lines   | decorative  |
//! | 7 | anything else                              | important   |
//!
//! Any failure while analysing an image (no placement, unreadable bytes, OCR
//! error) labels it important.

use crate::config::ImageSettings;
use crate::error::PageError;
use crate::pipeline::recognize::LineRecognizer;
use crate::pipeline::source::{BlockSource, PageImage, PageSize, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Characters of OCR text kept in each record.
pub const OCR_SAMPLE_CHARS: usize = 100;

/// Records shown per category in the preview.
pub const PREVIEW_SAMPLES: usize = 3;

const ERROR_REASON: &str = "Error during analysis - kept for safety";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageClass {
    Table,
    Important,
    Decorative,
}

impl fmt::Display for ImageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageClass::Table => "table",
            ImageClass::Important => "important",
            ImageClass::Decorative => "decorative",
        })
    }
}

// ── Rules ────────────────────────────────────────────────────────────────

/// What the rules look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSignals {
    /// Image area over page area.
    pub area_fraction: f64,
    pub line_count: usize,
    /// Characters of recognised text.
    pub text_len: usize,
    pub has_table_structure: bool,
}

struct Rule {
    applies: fn(&ImageSignals, &ImageSettings) -> bool,
    class: ImageClass,
    reason: &'static str,
}

const RULES: &[Rule] = &[
    Rule {
        applies: |s, _| s.has_table_structure,
        class: ImageClass::Table,
        reason: "table structure detected",
    },
    Rule {
        applies: |s, cfg| s.line_count >= cfg.min_lines_for_table,
        class: ImageClass::Table,
        reason: "enough text lines for a table",
    },
    Rule {
        applies: |s, _| s.line_count > 0 && s.text_len > 10,
        class: ImageClass::Important,
        reason: "contains text",
    },
    Rule {
        applies: |s, _| s.area_fraction > 0.20,
        class: ImageClass::Important,
        reason: "large area",
    },
    Rule {
        applies: |s, _| s.area_fraction > 0.10,
        class: ImageClass::Important,
        reason: "medium area",
    },
    Rule {
        applies: |s, cfg| s.area_fraction < cfg.area_threshold && s.line_count == 0,
        class: ImageClass::Decorative,
        reason: "small area, no text",
    },
    Rule {
        applies: |_, _| true,
        class: ImageClass::Important,
        reason: "uncertain - kept by default",
    },
];

/// Label an image from its signals. Returns the label and the reason of the
/// rule that fired.
pub fn classify(signals: &ImageSignals, settings: &ImageSettings) -> (ImageClass, &'static str) {
    RULES
        .iter()
        .find(|rule| (rule.applies)(signals, settings))
        .map(|rule| (rule.class, rule.reason))
        .unwrap_or((ImageClass::Important, "uncertain - kept by default"))
}

// ── Records ──────────────────────────────────────────────────────────────

/// Everything recorded about one image occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// 0-based page index.
    pub page: usize,
    pub reference: u32,
    pub rect: Option<Rect>,
    pub area_percentage: f64,
    pub ocr_lines: usize,
    pub ocr_confidence: f64,
    pub has_table_structure: bool,
    pub classification: ImageClass,
    pub reason: String,
    pub ocr_text_sample: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImageRecord {
    fn failed(page: usize, reference: u32, rect: Option<Rect>, error: &PageError) -> Self {
        Self {
            page,
            reference,
            rect,
            area_percentage: 0.0,
            ocr_lines: 0,
            ocr_confidence: 0.0,
            has_table_structure: false,
            classification: ImageClass::Important,
            reason: ERROR_REASON.to_string(),
            ocr_text_sample: String::new(),
            error: Some(error.to_string()),
        }
    }
}

/// First few records of each category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImagePreview {
    pub sample_decorative: Vec<ImageRecord>,
    pub sample_tables: Vec<ImageRecord>,
    pub sample_important: Vec<ImageRecord>,
}

/// Classification of every image in a document.
///
/// The three lists are disjoint: a table appears only in `table_images`.
/// Use [`ImageAnalysis::kept`] for everything that must survive cleaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub total_images: usize,
    pub table_images: Vec<ImageRecord>,
    pub important_images: Vec<ImageRecord>,
    pub decorative_images: Vec<ImageRecord>,
    pub preview: ImagePreview,
}

impl ImageAnalysis {
    /// Tables and important images.
    pub fn kept(&self) -> impl Iterator<Item = &ImageRecord> {
        self.table_images.iter().chain(self.important_images.iter())
    }

    pub fn kept_count(&self) -> usize {
        self.table_images.len() + self.important_images.len()
    }

    fn push(&mut self, record: ImageRecord) {
        match record.classification {
            ImageClass::Table => self.table_images.push(record),
            ImageClass::Important => self.important_images.push(record),
            ImageClass::Decorative => self.decorative_images.push(record),
        }
    }

    fn finish(mut self) -> Self {
        let first = |v: &[ImageRecord]| v.iter().take(PREVIEW_SAMPLES).cloned().collect();
        self.preview = ImagePreview {
            sample_decorative: first(&self.decorative_images),
            sample_tables: first(&self.table_images),
            sample_important: first(&self.important_images),
        };
        self
    }
}

// ── Analysis ─────────────────────────────────────────────────────────────

/// Classify every image on every page.
pub fn analyze(
    source: &dyn BlockSource,
    recognizer: &dyn LineRecognizer,
    settings: &ImageSettings,
) -> ImageAnalysis {
    if !settings.keep_tables {
        warn!("images.keep_tables = false is ignored; tables are always kept");
    }

    let mut analysis = ImageAnalysis::default();
    for page in 0..source.page_count() {
        let images = match source.page_images(page) {
            Ok(images) => images,
            Err(e) => {
                warn!("Cannot list images, nothing on this page will be removed: {}", e);
                continue;
            }
        };
        let size = source.page_size(page);

        for image in images {
            analysis.total_images += 1;
            let record = match &size {
                Ok(size) => analyze_image(page, *size, &image, recognizer, settings),
                Err(e) => Err(e.clone()),
            }
            .unwrap_or_else(|e| {
                warn!("Error analysing image {} on page {}: {}", image.reference, page, e);
                ImageRecord::failed(page, image.reference, image.rects.first().copied(), &e)
            });
            analysis.push(record);
        }
    }

    info!(
        "Image analysis complete: {} total, {} tables, {} important, {} decorative",
        analysis.total_images,
        analysis.table_images.len(),
        analysis.important_images.len(),
        analysis.decorative_images.len()
    );
    analysis.finish()
}

fn analyze_image(
    page: usize,
    size: PageSize,
    image: &PageImage,
    recognizer: &dyn LineRecognizer,
    settings: &ImageSettings,
) -> Result<ImageRecord, PageError> {
    let unreadable = |detail: &str| PageError::ImageUnreadable {
        page,
        reference: image.reference,
        detail: detail.to_string(),
    };

    let rect = *image.rects.first().ok_or_else(|| unreadable("no placement on page"))?;
    let page_area = size.area();
    if !(page_area.is_finite() && page_area > 0.0) {
        return Err(unreadable("page has no area"));
    }
    if image.bytes.is_empty() {
        return Err(unreadable("empty image stream"));
    }

    let area_fraction = rect.area() / page_area;
    let ocr = recognizer.recognize(&image.bytes)?;
    let text = ocr.text.trim();
    let signals = ImageSignals {
        area_fraction,
        line_count: ocr.line_count(),
        text_len: text.chars().count(),
        has_table_structure: ocr.has_table_structure(),
    };
    let (class, reason) = classify(&signals, settings);
    debug!(
        "Page {} image {}: {} ({}, area {:.1}%)",
        page,
        image.reference,
        class,
        reason,
        area_fraction * 100.0
    );

    Ok(ImageRecord {
        page,
        reference: image.reference,
        rect: Some(rect),
        area_percentage: area_fraction,
        ocr_lines: signals.line_count,
        ocr_confidence: ocr.mean_confidence(),
        has_table_structure: signals.has_table_structure,
        classification: class,
        reason: reason.to_string(),
        ocr_text_sample: text.chars().take(OCR_SAMPLE_CHARS).collect(),
        error: None,
    })
}
