//! # pdf-cleaner
//!
//! Clean bilingual Arabic/English PDFs before they are chunked and indexed
//! for retrieval.
//!
//! ## Why this crate?
//!
//! Annual reports, standards and fatwa collections repeat the same running
//! headers, page footers and logos on every page. Left in, they end up in
//! every retrieval chunk and drown out the content. This crate finds the
//! repeated text automatically, removes decorative images while never
//! touching tables or images that carry text, and writes clean text and
//! Markdown next to the cleaned PDF. A preview mode reports exactly what
//! would be removed before anything is.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Backup    copy the input to {stem}_raw.pdf
//!  ├─ 2. OCR       ocrmypdf text layer, chunked for large files
//!  ├─ 3. Detect    three header/footer algorithms, best consistency wins
//!  ├─ 4. Classify  OCR every image: table / important / decorative
//!  ├─ 5. Preview   {stem}_preview.json + recommendations
//!  ├─ 6. Clean     white overlays over headers, footers and decorative images
//!  └─ 7. Extract   filtered text, chunk simulation, structured Markdown
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_cleaner::{clean_document, CleaningConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CleaningConfig::builder()
//!         .preview_only(true)
//!         .build()?;
//!     let report = clean_document("context/annual_report.pdf", &config).await?;
//!     for line in &report.preview.as_ref().unwrap().recommendations {
//!         println!("{line}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The engines also run without pdfium over any [`BlockSource`], for
//! example a [`MemoryDocument`]:
//!
//! ```rust
//! use pdf_cleaner::pipeline::source::{MemoryDocument, MemoryPage};
//! use pdf_cleaner::pipeline::detect::detect;
//! use pdf_cleaner::CleaningConfig;
//!
//! let doc = MemoryDocument::new(
//!     (1..=10)
//!         .map(|n| {
//!             MemoryPage::new(600.0, 800.0)
//!                 .block(50.0, 20.0, 300.0, 32.0, "COMPANY REPORT 2024")
//!                 .block(50.0, 400.0, 500.0, 412.0, format!("Body {n}"))
//!         })
//!         .collect(),
//! );
//! let result = detect(&doc, &CleaningConfig::default().detection);
//! assert_eq!(result.headers, vec!["COMPANY REPORT 2024".to_string()]);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfclean` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pdf-cleaner = { version = "0.1", default-features = false }
//! ```
//!
//! ## External tools
//!
//! | Tool | Used by | Required |
//! |------|---------|----------|
//! | pdfium shared library | every PDF step | yes (`PDFIUM_LIB_PATH` or system path) |
//! | `ocrmypdf` | OCR pass | no, the step is recorded as failed and skipped |
//! | `tesseract` | image classification | no, unrecognisable images are kept |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod clean;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use clean::{analyze, clean_directory, clean_document, clean_files, clean_sync, Analysis};
pub use config::{CleaningConfig, CleaningConfigBuilder, Normalization};
pub use error::{CleanError, PageError};
pub use output::{BatchReport, DocumentReport, DocumentStatus, RunMode, StepOutcome};
pub use pipeline::classify::{ImageAnalysis, ImageClass, ImageRecord};
pub use pipeline::detect::{DetectionAlgorithm, DetectionResult};
pub use pipeline::recognize::{LineRecognizer, OcrOutput, OcrToken, TesseractRecognizer};
pub use pipeline::redact::RedactionLog;
pub use pipeline::report::PreviewReport;
pub use pipeline::source::{BlockSource, MemoryDocument, MemoryPage, RedactionSurface};
pub use progress::{CleaningProgressCallback, CleaningStep, NoopProgressCallback, ProgressCallback};
pub use stream::{clean_stream, DocumentStream};
