//! The cleaning engines chained the way `clean_document` chains them, over an
//! in-memory bilingual standard: analyse, redact, extract, structure.

use pdf_cleaner::config::TextSettings;
use pdf_cleaner::output::save_json;
use pdf_cleaner::pipeline::extract::{self, TextDirection};
use pdf_cleaner::pipeline::markdown;
use pdf_cleaner::pipeline::pattern::PatternSet;
use pdf_cleaner::pipeline::redact;
use pdf_cleaner::pipeline::source::{MemoryDocument, MemoryPage, Rect};
use pdf_cleaner::{
    analyze, CleaningConfig, DetectionAlgorithm, LineRecognizer, OcrOutput, PageError,
};

struct Blank;

impl LineRecognizer for Blank {
    fn recognize(&self, _image: &[u8]) -> Result<OcrOutput, PageError> {
        Ok(OcrOutput::default())
    }
}

const HEADER: &str = "AAOIFI Shariah Standards";

fn standard() -> MemoryDocument {
    MemoryDocument::new(
        (0..8)
            .map(|i| {
                let body = format!("المعيار الشرعي رقم {} بشأن المرابحة", i + 1);
                let mut page = MemoryPage::new(595.0, 842.0)
                    .block(60.0, 30.0, 400.0, 44.0, HEADER)
                    .block(60.0, 300.0, 520.0, 312.0, body.clone())
                    .block(270.0, 800.0, 330.0, 812.0, format!("Page {}", i + 1));
                if i == 0 {
                    page = page
                        .image(7, Rect::new(500.0, 20.0, 550.0, 60.0), b"logo".to_vec())
                        .run(60.0, 100.0, "Shariah Standard on Murabaha", 18.0)
                        .run(60.0, 140.0, "Scope of the standard", 15.0)
                        .run(60.0, 300.0, body, 11.0);
                }
                page
            })
            .collect(),
    )
}

fn config() -> CleaningConfig {
    let mut config = CleaningConfig::default();
    config.detection.algorithms = vec![
        DetectionAlgorithm::FuzzyMatching,
        DetectionAlgorithm::BBoxMatching,
    ];
    config
}

#[test]
fn analysis_feeds_redaction_and_extraction() {
    let mut doc = standard();
    let analysis = analyze(&doc, &Blank, &config());

    let detection = &analysis.detection;
    assert_eq!(detection.algorithm_used, Some(DetectionAlgorithm::FuzzyMatching));
    assert_eq!(detection.consistency_score, 1.0);
    assert_eq!(detection.headers, vec![HEADER.to_string()]);
    assert_eq!(detection.footers, vec!["Page #".to_string()]);
    assert_eq!(analysis.images.decorative_images.len(), 1);

    let patterns = PatternSet::new(&detection.headers, &detection.footers);
    let log = redact::apply(&mut doc, &patterns, &analysis.images.decorative_images, true);
    assert_eq!(log.text_spans, 16);
    assert_eq!(log.images, 1);
    assert_eq!(doc.covers(0).len(), 3);

    let extracted = extract::extract_text(&doc, &patterns, &TextSettings::default());
    assert_eq!(extracted.total_pages, 8);
    assert_eq!(extracted.rtl_pages.len(), 8);
    assert!(extracted.ltr_pages.is_empty());
    assert!(!extracted.text.contains(HEADER));
    assert!(!extracted.text.contains("Page"));
    assert!(extracted.text.contains("المعيار الشرعي رقم 5"));
    assert_eq!(extract::detect_direction(&extracted.page_texts[3]), TextDirection::Rtl);
}

#[test]
fn preview_shows_what_would_be_removed() {
    let analysis = analyze(&standard(), &Blank, &config());
    let preview = &analysis.preview;

    let pages: Vec<usize> = preview.sample_pages.iter().map(|p| p.page_number).collect();
    assert_eq!(pages, vec![1, 3, 5, 7]);
    for sample in &preview.sample_pages {
        assert!(sample.original_text_sample.starts_with(HEADER));
        assert!(!sample.processed_text_sample.contains(HEADER));
        assert!(!sample.processed_text_sample.contains("Page"));
        assert!(sample.text_change_percentage.is_some_and(|p| p > 0.0));
    }

    assert!(preview.recommendations[0].contains("high (1.00)"));
    assert!(preview
        .recommendations
        .iter()
        .any(|r| r.starts_with("1 decorative image(s) will be removed")));
}

#[tokio::test]
async fn preview_report_is_written_as_json() {
    let analysis = analyze(&standard(), &Blank, &config());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report").join("standard_preview.json");

    save_json(&path, &analysis.preview).await.unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let detection = &json["header_footer_detection"];
    assert_eq!(detection["algorithm_used"], "fuzzy_matching");
    assert_eq!(detection["count"]["headers"], 1);
    assert_eq!(detection["footers_detected"][0], "Page #");
    assert_eq!(json["image_analysis"]["images_to_remove"], 1);
    assert_eq!(json["image_analysis"]["classification_summary"]["decorative"], 1);
    assert_eq!(json["sample_pages"].as_array().map(Vec::len), Some(4));
    assert!(json["recommendations"].is_array());

    let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn markdown_headings_follow_font_size() {
    let structured = markdown::structure_document(&standard(), &TextSettings::default());

    assert!(structured
        .markdown
        .starts_with("# Shariah Standard on Murabaha\n\n## Scope of the standard\n\n"));
    assert!(structured.markdown.ends_with('\n'));
    assert!(!structured.markdown.ends_with("\n\n"));
    assert_eq!(structured.structure.h1_count, 1);
    assert_eq!(structured.structure.h2_count, 1);
    assert_eq!(structured.structure.body_count, 22);
    // AAOIFI and SHARIAH on seven pages, plus the title words.
    assert!(structured.cleaning.english_terms_preserved >= 14);
    assert_eq!(structured.cleaning.quranic_sequences_removed, 0);
}

#[test]
fn broken_quranic_font_becomes_a_placeholder() {
    let doc = MemoryDocument::new(vec![MemoryPage::new(595.0, 842.0).run(
        60.0,
        100.0,
        "قال الله تعالى XQZTR بسم",
        12.0,
    )]);
    let settings = TextSettings::default();

    let structured = markdown::structure_document(&doc, &settings);
    assert!(structured.markdown.contains(&settings.quranic_placeholder));
    assert!(!structured.markdown.contains("XQZTR"));
    assert_eq!(structured.cleaning.quranic_sequences_removed, 1);

    let raw = markdown::structure_document(
        &doc,
        &TextSettings {
            remove_quranic_noise: false,
            ..TextSettings::default()
        },
    );
    assert!(raw.markdown.contains("XQZTR"));
}

#[test]
fn chunk_simulation_respects_the_budget() {
    let doc = standard();
    let analysis = analyze(&doc, &Blank, &config());
    let patterns = PatternSet::new(&analysis.detection.headers, &analysis.detection.footers);
    let extracted = extract::extract_text(&doc, &patterns, &TextSettings::default());

    let chunks = extract::chunk_simulation(&extracted.text, 50);
    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|c| c.chars().count() <= 50));
    assert_eq!(
        chunks.join(" ").split_whitespace().collect::<Vec<_>>(),
        extracted.text.split_whitespace().collect::<Vec<_>>()
    );

    let rendered = extract::render_chunk_simulation(&chunks);
    assert!(rendered.starts_with(&format!("=== CHUNK 1/{} ===\n", chunks.len())));
}
