//! Streaming batch API: emit document reports as each document finishes.
//!
//! [`clean_stream`] yields one `Result<DocumentReport, CleanError>` per
//! input path, in input order. Documents are cleaned one at a time, so the
//! stream never holds more than one document's analysis in memory, and a
//! caller can write or display each report as soon as it is ready.
//!
//! [`crate::clean::clean_files`] is built on this stream and adds the
//! combined report.

use crate::clean::clean_document;
use crate::config::CleaningConfig;
use crate::error::CleanError;
use crate::output::DocumentReport;
use crate::pipeline::input;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::{info, warn};

/// A boxed stream of document results.
pub type DocumentStream = Pin<Box<dyn Stream<Item = Result<DocumentReport, CleanError>> + Send>>;

/// Clean `paths` sequentially, yielding each document's result as it
/// completes.
///
/// Progress callbacks receive `on_document_start` before each document and
/// `on_document_complete` or `on_document_error` after it.
///
/// # Example
/// ```rust,no_run
/// use pdf_cleaner::{clean_stream, CleaningConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = CleaningConfig::builder().preview_only(true).build().unwrap();
/// let mut reports = clean_stream(vec!["context/report.pdf".into()], &config);
/// while let Some(report) = reports.next().await {
///     match report {
///         Ok(r) => println!("{}: {:?}", r.file_name, r.status),
///         Err(e) => eprintln!("Error: {e}"),
///     }
/// }
/// # }
/// ```
pub fn clean_stream(paths: Vec<PathBuf>, config: &CleaningConfig) -> DocumentStream {
    let total = paths.len();
    let config = config.clone();

    let s = stream::iter(paths.into_iter().enumerate()).then(move |(i, path)| {
        let cfg = config.clone();
        async move {
            let index = i + 1;
            let file_name = input::file_name(&path);
            info!("Processing file {}/{}: {}", index, total, file_name);
            if let Some(cb) = &cfg.progress_callback {
                cb.on_document_start(index, total, &file_name);
            }

            let result = clean_document(&path, &cfg).await;
            match &result {
                Ok(_) => {
                    if let Some(cb) = &cfg.progress_callback {
                        cb.on_document_complete(index, total, &file_name);
                    }
                }
                Err(e) => {
                    warn!("Error processing {}: {}", file_name, e);
                    if let Some(cb) = &cfg.progress_callback {
                        cb.on_document_error(index, total, &file_name, &e.to_string());
                    }
                }
            }
            result
        }
    });

    Box::pin(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CleaningProgressCallback;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    impl CleaningProgressCallback for Events {
        fn on_document_start(&self, index: usize, total: usize, file_name: &str) {
            self.0.lock().unwrap().push(format!("start {index}/{total} {file_name}"));
        }

        fn on_document_error(&self, index: usize, _total: usize, file_name: &str, _error: &str) {
            self.0.lock().unwrap().push(format!("error {index} {file_name}"));
        }
    }

    #[tokio::test]
    async fn yields_in_input_order_and_reports_errors() {
        let events = Arc::new(Events::default());
        let config = CleaningConfig::builder()
            .progress_callback(events.clone())
            .build()
            .unwrap();
        let paths = vec![
            PathBuf::from("/nonexistent/b.pdf"),
            PathBuf::from("/nonexistent/a.pdf"),
        ];

        let results: Vec<_> = clean_stream(paths, &config).collect().await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| matches!(r, Err(CleanError::FileNotFound { .. }))));

        let events = events.0.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                "start 1/2 b.pdf",
                "error 1 b.pdf",
                "start 2/2 a.pdf",
                "error 2 a.pdf"
            ]
        );
    }
}
