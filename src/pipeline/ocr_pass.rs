//! Document OCR pass through `ocrmypdf`.
//!
//! Adds a text layer to scanned pages so the later stages have something to
//! read. Pages that already carry text are left alone (`--skip-text`).
//!
//! Large documents are split into chunks of `ocr.chunk_size` pages, each
//! chunk is OCR'd on its own, and the results are merged back in page order.
//! A chunk that fails to OCR is merged un-OCR'd rather than dropped.

use crate::config::OcrSettings;
use crate::error::CleanError;
use crate::pipeline::pdf;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

const INSTALL_HINT: &str = "Install with: pip install ocrmypdf (needs tesseract + ghostscript)";

/// What the OCR pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrStats {
    pub total_pages: usize,
    /// Chunks run through ocrmypdf; 0 when the file was OCR'd whole.
    pub chunks_processed: usize,
}

/// Arguments for one ocrmypdf invocation.
pub fn build_args(settings: &OcrSettings, language: &str, input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["--language".into(), language.into()];
    if settings.deskew {
        args.push("--deskew".into());
    }
    if settings.remove_background {
        args.push("--remove-background".into());
    }
    if settings.rotate_pages {
        args.push("--rotate-pages".into());
    }
    if let Some(output_type) = &settings.output_type {
        args.push("--output-type".into());
        args.push(output_type.into());
    }
    args.extend(
        ["--skip-text", "--optimize", "1", "--jpeg-quality", "85"]
            .into_iter()
            .map(OsString::from),
    );
    args.push(input.as_os_str().to_owned());
    args.push(output.as_os_str().to_owned());
    args
}

/// OCR `input` into `output`, chunking when the page count exceeds
/// `settings.chunk_size`.
pub async fn run_ocr(
    input: &Path,
    output: &Path,
    language: &str,
    settings: &OcrSettings,
) -> Result<OcrStats, CleanError> {
    let total_pages = pdf::page_count(input).await?;
    info!(
        "OCR: {} ({} pages, language {})",
        input.display(),
        total_pages,
        language
    );

    if total_pages <= settings.chunk_size {
        run_ocrmypdf(input, output, language, settings).await?;
        return Ok(OcrStats {
            total_pages,
            chunks_processed: 0,
        });
    }

    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| CleanError::OutputWriteFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    let temp = tempfile::Builder::new()
        .prefix("temp_chunks")
        .tempdir_in(parent)
        .map_err(|e| CleanError::Internal(format!("Cannot create chunk directory: {}", e)))?;

    let parts = ocr_in_chunks(input, &temp, language, settings).await?;
    pdf::merge_documents(&parts, output).await?;
    info!("OCR complete: {} chunks merged", parts.len());
    Ok(OcrStats {
        total_pages,
        chunks_processed: parts.len(),
    })
}

async fn ocr_in_chunks(
    input: &Path,
    temp: &TempDir,
    language: &str,
    settings: &OcrSettings,
) -> Result<Vec<PathBuf>, CleanError> {
    let chunks = pdf::split_into_chunks(input, temp.path(), settings.chunk_size).await?;
    let total = chunks.len();
    let mut parts = Vec::with_capacity(total);

    for (i, chunk) in chunks.into_iter().enumerate() {
        let ocr_chunk = temp.path().join(format!("chunk_{}_ocr.pdf", i));
        debug!("OCR chunk {}/{}", i + 1, total);
        match run_ocrmypdf(&chunk, &ocr_chunk, language, settings).await {
            Ok(()) => parts.push(ocr_chunk),
            Err(e) => {
                warn!("OCR failed for chunk {}/{}, keeping it as is: {}", i + 1, total, e);
                parts.push(chunk);
            }
        }
    }
    Ok(parts)
}

async fn run_ocrmypdf(
    input: &Path,
    output: &Path,
    language: &str,
    settings: &OcrSettings,
) -> Result<(), CleanError> {
    let args = build_args(settings, language, input, output);
    let child = Command::new(&settings.command)
        .args(&args)
        .kill_on_drop(true)
        .output();

    let result = tokio::time::timeout(Duration::from_secs(settings.timeout_secs), child)
        .await
        .map_err(|_| CleanError::OcrTimeout {
            path: input.to_path_buf(),
            secs: settings.timeout_secs,
        })?;

    let out = result.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            CleanError::ToolNotFound {
                tool: settings.command.clone(),
                hint: INSTALL_HINT.to_string(),
            }
        } else {
            CleanError::OcrFailed {
                path: input.to_path_buf(),
                detail: e.to_string(),
            }
        }
    })?;

    let produced = tokio::fs::try_exists(output).await.unwrap_or(false);
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        if !produced {
            return Err(CleanError::OcrFailed {
                path: input.to_path_buf(),
                detail: format!("{} exited with {}: {}", settings.command, out.status, stderr.trim()),
            });
        }
        warn!(
            "{} exited with {} but produced output; continuing",
            settings.command, out.status
        );
    } else if !produced {
        return Err(CleanError::OcrFailed {
            path: input.to_path_buf(),
            detail: "no output file produced".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_as_strings(settings: &OcrSettings) -> Vec<String> {
        build_args(settings, "ara+eng", Path::new("in.pdf"), Path::new("out.pdf"))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn default_arguments() {
        let args = args_as_strings(&OcrSettings::default());
        assert_eq!(&args[..2], ["--language", "ara+eng"]);
        assert!(args.contains(&"--skip-text".to_string()));
        assert_eq!(&args[args.len() - 2..], ["in.pdf", "out.pdf"]);
        assert!(args.contains(&"--deskew".to_string()));
        assert!(args.contains(&"pdfa".to_string()));
    }

    #[test]
    fn output_type_can_be_left_to_ocrmypdf() {
        let settings = OcrSettings {
            output_type: None,
            ..OcrSettings::default()
        };
        assert!(!args_as_strings(&settings).contains(&"--output-type".to_string()));
    }

    #[test]
    fn optional_flags_follow_settings() {
        let settings = OcrSettings {
            deskew: false,
            remove_background: true,
            rotate_pages: false,
            output_type: Some("pdfa".into()),
            ..OcrSettings::default()
        };
        let args = args_as_strings(&settings);
        assert!(!args.contains(&"--deskew".to_string()));
        assert!(!args.contains(&"--rotate-pages".to_string()));
        assert!(args.contains(&"--remove-background".to_string()));
        let i = args.iter().position(|a| a == "--output-type").unwrap();
        assert_eq!(args[i + 1], "pdfa");
    }

    #[tokio::test]
    async fn missing_tool_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let settings = OcrSettings {
            command: "definitely-not-ocrmypdf-xyz".into(),
            ..OcrSettings::default()
        };
        let err = run_ocrmypdf(
            Path::new("in.pdf"),
            &dir.path().join("out.pdf"),
            "eng",
            &settings,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CleanError::ToolNotFound { .. }), "got {err:?}");
    }
}
