//! Image classification and the redaction it drives.
//!
//! OCR is scripted: each fake image is a short byte tag mapped to the
//! recognition result the engine would have produced.

use pdf_cleaner::config::ImageSettings;
use pdf_cleaner::pipeline::classify::{analyze, classify, ImageAnalysis, ImageSignals};
use pdf_cleaner::pipeline::pattern::PatternSet;
use pdf_cleaner::pipeline::redact;
use pdf_cleaner::pipeline::source::{MemoryDocument, MemoryPage, PageImage, Rect};
use pdf_cleaner::{ImageClass, LineRecognizer, OcrOutput, OcrToken, PageError};
use proptest::prelude::*;
use std::collections::HashMap;

// ── Scripted recognizer ──────────────────────────────────────────────────────

#[derive(Default)]
struct Scripted(HashMap<Vec<u8>, Result<OcrOutput, PageError>>);

impl Scripted {
    fn with(mut self, tag: &[u8], output: Result<OcrOutput, PageError>) -> Self {
        self.0.insert(tag.to_vec(), output);
        self
    }
}

impl LineRecognizer for Scripted {
    fn recognize(&self, image: &[u8]) -> Result<OcrOutput, PageError> {
        self.0.get(image).cloned().unwrap_or_else(|| Ok(OcrOutput::default()))
    }
}

/// Two rows of three cells: a grid even though there are only two lines.
fn grid_output() -> OcrOutput {
    let row = |top: f32, cells: [&str; 3]| {
        cells
            .iter()
            .enumerate()
            .map(move |(i, c)| OcrToken::word(*c, 20.0 + 80.0 * i as f32, top, 91.0))
            .collect::<Vec<_>>()
    };
    OcrOutput {
        text: "Year Revenue Profit\n2024 120 15".into(),
        tokens: row(10.0, ["Year", "Revenue", "Profit"])
            .into_iter()
            .chain(row(40.0, ["2024", "120", "15"]))
            .collect(),
    }
}

fn recognition_error() -> PageError {
    PageError::RecognitionFailed {
        detail: "tesseract exited with status 1".into(),
    }
}

/// A4 page: a large table scan, a small logo, a seal the OCR engine chokes
/// on and a signature with no placement.
fn annual_report() -> MemoryDocument {
    let mut page = MemoryPage::new(595.0, 842.0)
        .block(60.0, 30.0, 400.0, 44.0, "COMPANY REPORT 2024")
        .image(1, Rect::new(60.0, 200.0, 460.0, 400.0), b"table".to_vec())
        .image(2, Rect::new(500.0, 20.0, 550.0, 60.0), b"logo".to_vec())
        .image(3, Rect::new(480.0, 700.0, 540.0, 760.0), b"seal".to_vec());
    page.images.push(PageImage {
        reference: 4,
        rects: Vec::new(),
        bytes: b"signature".to_vec(),
    });
    MemoryDocument::new(vec![page])
}

fn recognizer() -> Scripted {
    Scripted::default()
        .with(b"table", Ok(grid_output()))
        .with(b"seal", Err(recognition_error()))
}

fn class_of(analysis: &ImageAnalysis, reference: u32) -> ImageClass {
    analysis
        .table_images
        .iter()
        .chain(&analysis.important_images)
        .chain(&analysis.decorative_images)
        .find(|r| r.reference == reference)
        .map(|r| r.classification)
        .unwrap_or_else(|| panic!("image {reference} not analysed"))
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[test]
fn grid_of_tokens_is_a_protected_table() {
    let mut doc = annual_report();
    let analysis = analyze(&doc, &recognizer(), &ImageSettings::default());

    assert_eq!(analysis.total_images, 4);
    assert_eq!(class_of(&analysis, 1), ImageClass::Table);
    let table = &analysis.table_images[0];
    assert!(table.has_table_structure);
    assert_eq!(table.ocr_lines, 2);
    assert!((table.ocr_confidence - 0.91).abs() < 1e-6);
    assert!(table.ocr_text_sample.starts_with("Year Revenue"));

    // Handing table records to image redaction still paints nothing.
    assert_eq!(redact::redact_images(&mut doc, &analysis.table_images), 0);
    assert!(doc.covers(0).is_empty());
}

#[test]
fn small_textless_logo_is_decorative_and_covered() {
    let mut doc = annual_report();
    let analysis = analyze(&doc, &recognizer(), &ImageSettings::default());

    assert_eq!(class_of(&analysis, 2), ImageClass::Decorative);
    assert_eq!(analysis.decorative_images.len(), 1);

    let log = redact::apply(&mut doc, &PatternSet::default(), &analysis.decorative_images, true);
    assert_eq!(log.images, 1);
    assert_eq!(log.text_spans, 0);
    assert_eq!(doc.covers(0), &[Rect::new(500.0, 20.0, 550.0, 60.0)]);
}

#[test]
fn decorative_removal_can_be_disabled() {
    let mut doc = annual_report();
    let analysis = analyze(&doc, &recognizer(), &ImageSettings::default());
    let log = redact::apply(&mut doc, &PatternSet::default(), &analysis.decorative_images, false);
    assert_eq!(log.images, 0);
    assert!(doc.covers(0).is_empty());
}

#[test]
fn failures_keep_the_image() {
    let analysis = analyze(&annual_report(), &recognizer(), &ImageSettings::default());

    assert_eq!(class_of(&analysis, 3), ImageClass::Important);
    assert_eq!(class_of(&analysis, 4), ImageClass::Important);
    let errors: Vec<&str> = analysis
        .important_images
        .iter()
        .filter_map(|r| r.error.as_deref())
        .collect();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|e| e.contains("tesseract exited")));
    assert!(errors.iter().any(|e| e.contains("no placement")));
}

#[test]
fn categories_are_disjoint_and_account_for_every_image() {
    let analysis = analyze(&annual_report(), &recognizer(), &ImageSettings::default());
    assert_eq!(
        analysis.table_images.len() + analysis.important_images.len() + analysis.decorative_images.len(),
        analysis.total_images
    );
    assert_eq!(analysis.kept_count(), 3);
    assert!(analysis.kept().all(|r| r.classification != ImageClass::Decorative));
}

#[test]
fn unreadable_page_contributes_no_images() {
    let doc = MemoryDocument::new(vec![
        MemoryPage::new(595.0, 842.0)
            .image(9, Rect::new(0.0, 0.0, 10.0, 10.0), b"logo".to_vec())
            .unreadable(),
    ]);
    let analysis = analyze(&doc, &recognizer(), &ImageSettings::default());
    assert_eq!(analysis.total_images, 0);
}

#[test]
fn keep_tables_false_still_protects_tables() {
    let settings = ImageSettings {
        keep_tables: false,
        ..ImageSettings::default()
    };
    let analysis = analyze(&annual_report(), &recognizer(), &settings);
    assert_eq!(class_of(&analysis, 1), ImageClass::Table);
    assert!(analysis.decorative_images.iter().all(|r| r.reference != 1));
}

#[test]
fn small_three_row_grid_is_still_a_table() {
    // Three rows of label/value pairs on a scan covering about 1% of the page.
    let rows = [("Assets", "120"), ("Liabilities", "80"), ("Equity", "40")];
    let grid = OcrOutput {
        text: "Assets 120\nLiabilities 80\nEquity 40".into(),
        tokens: rows
            .iter()
            .enumerate()
            .flat_map(|(r, (label, value))| {
                let top = 10.0 + 30.0 * r as f32;
                [
                    OcrToken::word(*label, 10.0, top, 88.0),
                    OcrToken::word(*value, 120.0, top, 88.0),
                ]
            })
            .collect(),
    };
    let doc = MemoryDocument::new(vec![MemoryPage::new(595.0, 842.0).image(
        5,
        Rect::new(100.0, 100.0, 150.0, 200.0),
        b"balance".to_vec(),
    )]);
    let recognizer = Scripted::default().with(b"balance", Ok(grid));

    let analysis = analyze(&doc, &recognizer, &ImageSettings::default());

    assert_eq!(class_of(&analysis, 5), ImageClass::Table);
    assert!(analysis.table_images[0].area_percentage < 0.01);
    assert!(analysis.decorative_images.is_empty());
}

#[test]
fn analysis_is_idempotent() {
    let doc = annual_report();
    let recognizer = recognizer();
    let first = analyze(&doc, &recognizer, &ImageSettings::default());
    let second = analyze(&doc, &recognizer, &ImageSettings::default());
    assert_eq!(first, second);
}

// ── Properties ───────────────────────────────────────────────────────────────

fn signals_strategy() -> impl Strategy<Value = ImageSignals> {
    (0.0f64..1.0, 0usize..8, 0usize..200, any::<bool>()).prop_map(
        |(area_fraction, line_count, text_len, has_table_structure)| ImageSignals {
            area_fraction,
            line_count,
            text_len,
            has_table_structure,
        },
    )
}

fn settings_strategy() -> impl Strategy<Value = ImageSettings> {
    (0.0f64..0.3, 1usize..6).prop_map(|(area_threshold, min_lines_for_table)| ImageSettings {
        area_threshold,
        min_lines_for_table,
        ..ImageSettings::default()
    })
}

proptest! {
    #[test]
    fn classification_is_stable(signals in signals_strategy(), settings in settings_strategy()) {
        prop_assert_eq!(classify(&signals, &settings), classify(&signals, &settings));
    }

    #[test]
    fn table_structure_is_never_decorative(
        signals in signals_strategy(),
        settings in settings_strategy(),
    ) {
        let signals = ImageSignals { has_table_structure: true, ..signals };
        prop_assert_eq!(classify(&signals, &settings).0, ImageClass::Table);
    }

    #[test]
    fn enough_lines_is_always_a_table(
        signals in signals_strategy(),
        settings in settings_strategy(),
        extra in 0usize..5,
    ) {
        let signals = ImageSignals { line_count: settings.min_lines_for_table + extra, ..signals };
        prop_assert_eq!(classify(&signals, &settings).0, ImageClass::Table);
    }

    #[test]
    fn decorative_means_small_and_textless(
        signals in signals_strategy(),
        settings in settings_strategy(),
    ) {
        if classify(&signals, &settings).0 == ImageClass::Decorative {
            prop_assert!(signals.area_fraction < settings.area_threshold);
            prop_assert_eq!(signals.line_count, 0);
            prop_assert!(!signals.has_table_structure);
        }
    }
}
