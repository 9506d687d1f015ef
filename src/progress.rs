//! Progress-callback trait for batch and per-document cleaning events.
//!
//! Inject an [`Arc<dyn CleaningProgressCallback>`] via
//! [`crate::config::CleaningConfigBuilder::progress_callback`] to receive
//! events as the batch driver works through documents and their steps.
//!
//! # Example
//!
//! ```rust
//! use pdf_cleaner::{CleaningConfig, CleaningProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     finished: AtomicUsize,
//! }
//!
//! impl CleaningProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, index: usize, total: usize, file_name: &str) {
//!         self.finished.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {} done", index, total, file_name);
//!     }
//! }
//!
//! let config = CleaningConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { finished: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::report::PreviewReport;
use std::fmt;
use std::sync::Arc;

/// The stages of a single document run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleaningStep {
    Backup,
    Ocr,
    Analysis,
    Preview,
    FinalCleaning,
    TextExtraction,
}

impl CleaningStep {
    /// Number of steps, for progress-bar lengths.
    pub const COUNT: usize = 6;

    pub fn label(&self) -> &'static str {
        match self {
            CleaningStep::Backup => "backup",
            CleaningStep::Ocr => "ocr",
            CleaningStep::Analysis => "analysis",
            CleaningStep::Preview => "preview",
            CleaningStep::FinalCleaning => "final cleaning",
            CleaningStep::TextExtraction => "text extraction",
        }
    }
}

impl fmt::Display for CleaningStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Called by the batch driver as it processes documents.
///
/// Documents are processed one at a time, so events arrive in order. The
/// trait is still `Send + Sync` because the driver hops between tokio worker
/// and blocking threads. All methods have default no-op implementations.
///
/// `index` arguments are 1-based.
pub trait CleaningProgressCallback: Send + Sync {
    /// Called once before the first document.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called before a document's first step.
    fn on_document_start(&self, index: usize, total: usize, file_name: &str) {
        let _ = (index, total, file_name);
    }

    /// Called as each step of the current document begins.
    fn on_step(&self, file_name: &str, step: CleaningStep) {
        let _ = (file_name, step);
    }

    /// Called with the preview report once it has been built.
    fn on_preview(&self, file_name: &str, report: &PreviewReport) {
        let _ = (file_name, report);
    }

    /// Called when a document finishes (possibly with failed steps).
    fn on_document_complete(&self, index: usize, total: usize, file_name: &str) {
        let _ = (index, total, file_name);
    }

    /// Called when a document is skipped because of a fatal error.
    fn on_document_error(&self, index: usize, total: usize, file_name: &str, error: &str) {
        let _ = (index, total, file_name, error);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, total_files: usize, processed: usize) {
        let _ = (total_files, processed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl CleaningProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::CleaningConfig`].
pub type ProgressCallback = Arc<dyn CleaningProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCallback {
        events: Mutex<Vec<String>>,
    }

    impl CleaningProgressCallback for RecordingCallback {
        fn on_batch_start(&self, total_files: usize) {
            self.events.lock().unwrap().push(format!("batch:{total_files}"));
        }

        fn on_step(&self, file_name: &str, step: CleaningStep) {
            self.events.lock().unwrap().push(format!("{file_name}:{step}"));
        }

        fn on_document_error(&self, index: usize, _total: usize, _file_name: &str, error: &str) {
            self.events.lock().unwrap().push(format!("error:{index}:{error}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_document_start(1, 2, "a.pdf");
        cb.on_step("a.pdf", CleaningStep::Ocr);
        cb.on_document_complete(1, 2, "a.pdf");
        cb.on_document_error(2, 2, "b.pdf", "corrupt");
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn recording_callback_receives_events_in_order() {
        let cb = RecordingCallback::default();
        cb.on_batch_start(1);
        cb.on_step("a.pdf", CleaningStep::Analysis);
        cb.on_step("a.pdf", CleaningStep::Preview);
        cb.on_document_error(1, 1, "a.pdf", "boom");
        // Defaulted methods are silent.
        cb.on_document_complete(1, 1, "a.pdf");

        let events = cb.events.lock().unwrap();
        assert_eq!(
            *events,
            vec!["batch:1", "a.pdf:analysis", "a.pdf:preview", "error:1:boom"]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(3);
        cb.on_step("x.pdf", CleaningStep::TextExtraction);
    }
}
