//! Report types produced by a cleaning run, and the helpers that write them.
//!
//! A [`DocumentReport`] is returned for every document that got past input
//! validation, even when individual steps failed: each step carries its own
//! [`StepOutcome`]. The batch driver folds these into a [`BatchReport`]
//! written as `cleaning_report.json`.

use crate::error::CleanError;
use crate::pipeline::detect::{AlgorithmScore, DetectionAlgorithm};
use crate::pipeline::markdown::{NoiseStats, StructureInfo};
use crate::pipeline::redact::RedactionLog;
use crate::pipeline::report::PreviewReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// Timestamp format used in every report.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Local time formatted with [`TIMESTAMP_FORMAT`].
pub fn timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

// ── Step outcomes ────────────────────────────────────────────────────────

/// Result of one pipeline step, serialised with a `status` tag.
///
/// `T` must serialise as a map; every step-detail struct below does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome<T> {
    Completed(T),
    /// The step produced its artefact but part of the work failed.
    Partial(T),
    Failed { error: String },
    Skipped { reason: String },
}

impl<T> StepOutcome<T> {
    pub fn failed(error: impl Display) -> Self {
        StepOutcome::Failed {
            error: error.to_string(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        StepOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            StepOutcome::Completed(_) => "completed",
            StepOutcome::Partial(_) => "partial",
            StepOutcome::Failed { .. } => "failed",
            StepOutcome::Skipped { .. } => "skipped",
        }
    }

    /// Failed or partial.
    pub fn has_errors(&self) -> bool {
        matches!(self, StepOutcome::Failed { .. } | StepOutcome::Partial(_))
    }

    pub fn details(&self) -> Option<&T> {
        match self {
            StepOutcome::Completed(d) | StepOutcome::Partial(d) => Some(d),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrStep {
    pub output: PathBuf,
    pub language: String,
    pub total_pages: usize,
    pub chunks_processed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionStep {
    pub algorithm_used: DetectionAlgorithm,
    pub consistency_score: f64,
    pub headers: Vec<String>,
    pub footers: Vec<String>,
    pub sampled_pages: usize,
    pub evaluated: Vec<AlgorithmScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageStep {
    pub total_images: usize,
    pub tables: usize,
    pub important: usize,
    pub decorative: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewStep {
    pub report: PathBuf,
    pub images_to_remove: usize,
    pub images_to_keep: usize,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalCleaningStep {
    pub output: PathBuf,
    pub text_spans_redacted: usize,
    pub images_removed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextExtractionStep {
    pub source: PathBuf,
    pub text_file: PathBuf,
    pub characters: usize,
    pub total_pages: usize,
    pub rtl_pages: usize,
    pub ltr_pages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_file: Option<PathBuf>,
    pub chunks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure: Option<StructureInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_cleaning: Option<NoiseStats>,
}

/// Every step of one document run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReports {
    pub ocr: StepOutcome<OcrStep>,
    pub header_footer_detection: StepOutcome<DetectionStep>,
    pub image_analysis: StepOutcome<ImageStep>,
    pub preview: StepOutcome<PreviewStep>,
    pub final_cleaning: StepOutcome<FinalCleaningStep>,
    pub text_extraction: StepOutcome<TextExtractionStep>,
}

impl StepReports {
    pub fn has_errors(&self) -> bool {
        self.ocr.has_errors()
            || self.header_footer_detection.has_errors()
            || self.image_analysis.has_errors()
            || self.preview.has_errors()
            || self.final_cleaning.has_errors()
            || self.text_extraction.has_errors()
    }
}

// ── Document report ──────────────────────────────────────────────────────

/// Paths of every PDF version of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    /// Backup copy, or the input itself when backups are off.
    pub raw: PathBuf,
    /// OCR'd copy, or the input when OCR was skipped or failed.
    pub ocr: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaned: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Full,
    PreviewOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Completed,
    /// At least one step failed or only partly succeeded.
    CompletedWithErrors,
}

/// Everything recorded about one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub file_name: String,
    pub language: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_seconds: f64,
    pub versions: ArtifactPaths,
    pub mode: RunMode,
    pub steps: StepReports,
    pub redaction: RedactionLog,
    pub status: DocumentStatus,
    /// Full preview; written to its own file, not repeated in the batch report.
    #[serde(skip)]
    pub preview: Option<PreviewReport>,
}

// ── Batch report ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub file_name: String,
    pub error: String,
}

/// Contents of `cleaning_report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total_files: usize,
    pub processed: usize,
    pub failures: Vec<DocumentFailure>,
    pub preview_mode: bool,
    pub timestamp: String,
    /// Keyed by file name.
    pub files: BTreeMap<String, DocumentReport>,
}

// ── Writers ──────────────────────────────────────────────────────────────

/// Write `contents` atomically: temp file in the same directory, then rename.
pub async fn write_atomic(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), CleanError> {
    let write_err = |e| CleanError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)
}

/// Pretty-printed UTF-8 JSON, written atomically.
pub async fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CleanError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| CleanError::ReportWriteFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    write_atomic(path, json).await.map_err(|e| match e {
        CleanError::OutputWriteFailed { path, source } => CleanError::ReportWriteFailed {
            path,
            detail: source.to_string(),
        },
        other => other,
    })
}
