//! Pipeline stages for PDF cleaning.
//!
//! Each submodule implements exactly one step. The engines (`detect`,
//! `classify`, `redact`, `report`, `extract`, `markdown`) are synchronous
//! and only see the [`source::BlockSource`] / [`source::RedactionSurface`]
//! traits, so every one of them is testable against
//! [`source::MemoryDocument`] without pdfium.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ ocr_pass ──▶ pdf ──▶ detect ──▶ classify ──▶ report
//! (%PDF)    (ocrmypdf)  (pdfium)  (hdr/ftr)  (images)    (preview)
//!                                    │           │
//!                                    └──▶ redact ◀┘──▶ extract ──▶ markdown
//!                                      (overlays)      (text)     (structure)
//! ```
//!
//! 1. [`input`]       validate the path, discover batch inputs
//! 2. [`ocr_pass`]    add a text layer with ocrmypdf, chunked for large files
//! 3. [`pdf`]         pdfium adapter; every call runs off the async workers
//! 4. [`detect`]      three header/footer algorithms, best one selected
//! 5. [`classify`]    OCR each image via [`recognize`] and label it
//! 6. [`report`]      preview report and recommendations
//! 7. [`redact`]      white overlays over matched text and decorative images
//! 8. [`extract`]     filtered, normalised text and chunk simulation
//! 9. [`markdown`]    font-size headings and Quranic-font noise cleanup

pub mod classify;
pub mod detect;
pub mod encode;
pub mod extract;
pub mod input;
pub mod markdown;
pub mod ocr_pass;
pub mod pattern;
pub mod pdf;
pub mod recognize;
pub mod redact;
pub mod report;
pub mod similarity;
pub mod source;
