//! End-to-end integration tests for pdf-cleaner.
//!
//! These tests use real PDF files in `./test_cases/` and need the pdfium
//! shared library. OCR runs only when `ocrmypdf` is installed. They are gated
//! behind the `E2E_ENABLED` environment variable so they do not run in CI
//! unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=. cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_preview -- --nocapture

use pdf_cleaner::clean::BATCH_REPORT_FILE;
use pdf_cleaner::pipeline::pdf;
use pdf_cleaner::{
    clean_directory, clean_document, BatchReport, CleanError, CleaningConfig, DocumentStatus,
    RunMode,
};
use std::path::{Path, PathBuf};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            println!("       Put a bilingual report at test_cases/annual_report.pdf");
            return;
        }
        p
    }};
}

fn config_into(out: &Path) -> CleaningConfig {
    CleaningConfig::builder()
        .input_dir(test_cases_dir())
        .output_dir(out.join("output"))
        .report_dir(out.join("report"))
        .ocr_enabled(which_ocrmypdf())
        .build()
        .expect("valid config")
}

fn which_ocrmypdf() -> bool {
    std::process::Command::new("ocrmypdf")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Assert the Markdown output passes basic quality checks.
fn assert_markdown_quality(md: &str, context: &str) {
    assert!(!md.trim().is_empty(), "[{context}] Markdown is empty");
    assert!(md.ends_with('\n'), "[{context}] Markdown must end with a newline");
    assert!(
        !md.ends_with("\n\n"),
        "[{context}] Markdown must end with exactly one newline"
    );
    assert!(
        !md.contains("\n\n\n\n"),
        "[{context}] Output has more than 3 consecutive blank lines"
    );
    for ch in ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{2060}'] {
        assert!(
            !md.contains(ch),
            "[{context}] Output contains invisible char U+{:04X}",
            ch as u32
        );
    }
    println!("[{context}] ✓  {} bytes, quality checks passed", md.len());
}

// ── PDF plumbing ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_split_and_merge_keep_every_page() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("annual_report.pdf"));
    let tmp = tempfile::tempdir().unwrap();

    let total = pdf::page_count(&path).await.expect("page_count should succeed");
    assert!(total > 0);

    let parts = pdf::split_into_chunks(&path, tmp.path(), 2)
        .await
        .expect("split should succeed");
    assert_eq!(parts.len(), total.div_ceil(2));

    let merged = tmp.path().join("merged.pdf");
    pdf::merge_documents(&parts, &merged)
        .await
        .expect("merge should succeed");
    assert_eq!(pdf::page_count(&merged).await.unwrap(), total);
}

// ── Document runs ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_preview_writes_report_and_leaves_pdf_alone() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("annual_report.pdf"));
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config_into(tmp.path());
    config.preview.preview_only = true;

    let report = clean_document(&path, &config)
        .await
        .expect("clean_document should succeed");

    assert_eq!(report.mode, RunMode::PreviewOnly);
    assert!(report.versions.raw.exists(), "backup must be written");
    assert!(report.versions.cleaned.is_none());
    assert_eq!(report.steps.final_cleaning.status(), "skipped");
    assert_eq!(report.redaction.total(), 0);

    let preview_file = tmp.path().join("report").join("annual_report_preview.json");
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&preview_file).unwrap()).unwrap();
    assert!(json["header_footer_detection"].is_object());
    assert!(json["recommendations"].as_array().is_some_and(|r| !r.is_empty()));

    let preview = report.preview.expect("preview kept on the report");
    println!("{}", pdf_cleaner::pipeline::report::render_summary(&preview));
}

#[tokio::test]
async fn test_full_clean_writes_every_artefact() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("annual_report.pdf"));
    let tmp = tempfile::tempdir().unwrap();
    let config = config_into(tmp.path());

    let report = clean_document(&path, &config)
        .await
        .expect("clean_document should succeed");
    println!("{}", serde_json::to_string_pretty(&report).unwrap());

    assert_eq!(report.mode, RunMode::Full);
    let cleaned = report.versions.cleaned.clone().expect("cleaned PDF path");
    assert!(cleaned.exists());
    assert_eq!(
        pdf::page_count(&cleaned).await.unwrap(),
        pdf::page_count(&path).await.unwrap(),
        "cleaning must not drop pages"
    );

    let out = tmp.path().join("output");
    assert!(!out.join("annual_report_temp_cleaned.pdf").exists());
    assert!(out.join("annual_report_cleaned.txt").exists());
    assert!(out.join("annual_report_chunk_simulation.txt").exists());
    let md = std::fs::read_to_string(out.join("annual_report_structured.md")).unwrap();
    assert_markdown_quality(&md, "annual_report");

    if report.status == DocumentStatus::Completed {
        assert!(!report.steps.has_errors());
    }
}

#[tokio::test]
async fn test_nonexistent_file() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP");
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let result = clean_document("/nonexistent/report.pdf", &config_into(tmp.path())).await;
    assert!(
        matches!(result, Err(CleanError::FileNotFound { .. })),
        "Expected FileNotFound, got: {result:?}"
    );
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_batch_preview_over_test_cases() {
    let _ = e2e_skip_unless_ready!(test_cases_dir().join("annual_report.pdf"));
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config_into(tmp.path());
    config.preview.preview_only = true;

    let batch = clean_directory(&config)
        .await
        .expect("clean_directory should succeed");

    assert!(batch.preview_mode);
    assert_eq!(batch.processed + batch.failures.len(), batch.total_files);
    assert!(batch.files.contains_key("annual_report.pdf"));

    let written: BatchReport = serde_json::from_str(
        &std::fs::read_to_string(tmp.path().join("report").join(BATCH_REPORT_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(written.total_files, batch.total_files);
}
