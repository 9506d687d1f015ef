//! Error types for the pdf-cleaner library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`CleanError`]: **fatal** for one document (or the whole batch): the
//!   file is missing, is not a PDF, pdfium cannot be loaded, the config is
//!   invalid. In batch mode a fatal document error is recorded in the
//!   combined report and the batch moves on to the next file.
//!
//! * [`PageError`]: **non-fatal**: one page, one image or one detection
//!   algorithm failed. These are caught where they happen and resolved
//!   toward preservation (an unreadable image is kept, a failed algorithm is
//!   excluded from selection). They are serialisable so they can be carried
//!   into the JSON reports.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-cleaner library.
#[derive(Debug, Error)]
pub enum CleanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The input directory holds no `*.pdf` files.
    #[error("No PDF files found in '{dir}'\nPut documents there or pass --file <PDF>.")]
    NoInputFiles { dir: PathBuf },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password. Encrypted inputs are not cleaned.
    #[error("PDF '{path}' is encrypted.\nDecrypt it first, e.g. qpdf --decrypt input.pdf output.pdf")]
    PasswordRequired { path: PathBuf },

    /// pdfium refused to save a modified document.
    #[error("Failed to save PDF '{path}': {detail}")]
    SaveFailed { path: PathBuf, detail: String },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// An external tool (ocrmypdf, tesseract) is not on PATH.
    #[error("'{tool}' was not found on PATH.\n{hint}")]
    ToolNotFound { tool: String, hint: String },

    /// ocrmypdf exited without producing an output file.
    #[error("OCR failed for '{path}': {detail}")]
    OcrFailed { path: PathBuf, detail: String },

    /// ocrmypdf did not finish within the configured timeout.
    #[error("OCR timed out after {secs}s for '{path}'\nRaise ocr.timeout_secs or lower ocr.chunk_size.")]
    OcrTimeout { path: PathBuf, secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output artefact (PDF copy, text file).
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not serialise or write a JSON report.
    #[error("Failed to write report '{path}': {detail}")]
    ReportWriteFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The TOML config file could not be read or parsed.
    #[error("Failed to load config '{path}': {detail}")]
    ConfigLoadFailed { path: PathBuf, detail: String },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Install pdfium system-wide so it can be found on the library path.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page, image or algorithm.
///
/// Every place that catches one of these resolves toward keeping content.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Text blocks or spans could not be read from the page.
    #[error("Page {page}: text unavailable: {detail}")]
    BlocksUnavailable { page: usize, detail: String },

    /// The embedded image stream could not be decoded.
    #[error("Page {page}: image {reference} unreadable: {detail}")]
    ImageUnreadable {
        page: usize,
        reference: u32,
        detail: String,
    },

    /// The OCR engine failed on an image.
    #[error("OCR recognition failed: {detail}")]
    RecognitionFailed { detail: String },

    /// An overlay could not be drawn on a page.
    #[error("Page {page}: redaction failed: {detail}")]
    RedactionFailed { page: usize, detail: String },

    /// One header/footer detection algorithm failed.
    #[error("Detection algorithm '{algorithm}' failed: {detail}")]
    DetectionFailed { algorithm: String, detail: String },
}
