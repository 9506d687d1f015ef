//! Document and batch cleaning entry points.
//!
//! A document runs through six steps, strictly in order:
//!
//! 1. backup     copy the input to `{stem}_raw.pdf`
//! 2. OCR        `{stem}_ocr.pdf`; on failure the input is used as is
//! 3. analysis   header/footer detection and image classification
//! 4. preview    `{report_dir}/{stem}_preview.json`
//! 5. cleaning   overlays into `{stem}_cleaned.pdf` (skipped in preview mode)
//! 6. text       `{stem}_cleaned.txt`, `_chunk_simulation.txt`, `_structured.md`
//!
//! Only input validation, backup and opening the PDF for analysis are fatal
//! for a document. Every other failure is recorded on its step and the run
//! continues with the best artefact available.

use crate::config::CleaningConfig;
use crate::error::CleanError;
use crate::output::{
    save_json, timestamp, write_atomic, ArtifactPaths, BatchReport, DetectionStep,
    DocumentFailure, DocumentReport, DocumentStatus, FinalCleaningStep, ImageStep, OcrStep,
    PreviewStep, RunMode, StepOutcome, StepReports, TextExtractionStep,
};
use crate::pipeline::classify::{self, ImageAnalysis, ImageRecord};
use crate::pipeline::detect::{self, DetectionResult};
use crate::pipeline::extract::{self, ExtractedText};
use crate::pipeline::markdown::{self, StructuredText};
use crate::pipeline::pattern::PatternSet;
use crate::pipeline::pdf::{self, PdfiumDocument};
use crate::pipeline::recognize::{LineRecognizer, TesseractRecognizer};
use crate::pipeline::redact::{self, RedactionLog};
use crate::pipeline::report::{self, PreviewReport};
use crate::pipeline::source::BlockSource;
use crate::pipeline::{input, ocr_pass};
use crate::progress::CleaningStep;
use crate::stream::clean_stream;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// File name of the combined batch report inside `report_dir`.
pub const BATCH_REPORT_FILE: &str = "cleaning_report.json";

// ── Analysis ─────────────────────────────────────────────────────────────

/// Detection, classification and the preview built from them.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub detection: DetectionResult,
    pub images: ImageAnalysis,
    pub preview: PreviewReport,
}

/// Run detection, image classification and preview building over any
/// [`BlockSource`].
///
/// This is the in-memory core of [`clean_document`]; it touches no files.
pub fn analyze(
    source: &dyn BlockSource,
    recognizer: &dyn LineRecognizer,
    config: &CleaningConfig,
) -> Analysis {
    let detection = detect::detect(source, &config.detection);
    let images = classify::analyze(source, recognizer, &config.images);
    let preview = report::build(source, &detection, Some(&images), &config.preview);
    Analysis {
        detection,
        images,
        preview,
    }
}

// ── Document ─────────────────────────────────────────────────────────────

/// Clean one PDF.
///
/// # Errors
/// Returns `Err(CleanError)` only for fatal errors:
/// - File not found / permission denied / not a PDF
/// - Backup or output directory could not be written
/// - pdfium unavailable, or the PDF cannot be opened for analysis
pub async fn clean_document(
    input_path: impl AsRef<Path>,
    config: &CleaningConfig,
) -> Result<DocumentReport, CleanError> {
    let started = Instant::now();
    let start_time = timestamp();

    let pdf_path = input::resolve_local(input_path.as_ref())?;
    let file_name = input::file_name(&pdf_path);
    let stem = input::file_stem(&pdf_path);
    let language = config.language_for(&file_name).to_string();
    let preview_only = config.preview.preview_only;
    info!(
        "Cleaning {} (language {}, {} mode)",
        file_name,
        language,
        if preview_only { "preview" } else { "full" }
    );

    create_dir(&config.output_dir).await?;
    create_dir(&config.report_dir).await?;
    let artefact = |suffix: &str| config.output_dir.join(format!("{stem}_{suffix}"));

    // ── Step 1: Backup ───────────────────────────────────────────────────
    notify(config, &file_name, CleaningStep::Backup);
    let raw = if config.safety.create_backups {
        let raw = artefact("raw.pdf");
        copy_file(&pdf_path, &raw).await?;
        info!("Backup: {}", raw.display());
        raw
    } else {
        pdf_path.clone()
    };

    // ── Step 2: OCR ──────────────────────────────────────────────────────
    notify(config, &file_name, CleaningStep::Ocr);
    let ocr_path = artefact("ocr.pdf");
    let (ocr_source, ocr_step) = if !config.ocr.enabled {
        info!("OCR disabled in config");
        (pdf_path.clone(), StepOutcome::skipped("disabled in config"))
    } else {
        match ocr_pass::run_ocr(&pdf_path, &ocr_path, &language, &config.ocr).await {
            Ok(stats) => (
                ocr_path.clone(),
                StepOutcome::Completed(OcrStep {
                    output: ocr_path.clone(),
                    language: language.clone(),
                    total_pages: stats.total_pages,
                    chunks_processed: stats.chunks_processed,
                }),
            ),
            Err(e) => {
                warn!("OCR failed, continuing with the original file: {}", e);
                (pdf_path.clone(), StepOutcome::failed(e))
            }
        }
    };

    // ── Step 3: Analysis ─────────────────────────────────────────────────
    notify(config, &file_name, CleaningStep::Analysis);
    let analysis = analyze_file(&ocr_source, config, &language).await?;
    let detection_step = detection_outcome(&analysis.detection);
    let image_step = StepOutcome::Completed(ImageStep {
        total_images: analysis.images.total_images,
        tables: analysis.images.table_images.len(),
        important: analysis.images.important_images.len(),
        decorative: analysis.images.decorative_images.len(),
    });

    // ── Step 4: Preview ──────────────────────────────────────────────────
    notify(config, &file_name, CleaningStep::Preview);
    let preview_path = config.report_dir.join(format!("{stem}_preview.json"));
    let preview_step = match save_json(&preview_path, &analysis.preview).await {
        Ok(()) => {
            info!("Preview report: {}", preview_path.display());
            StepOutcome::Completed(PreviewStep {
                report: preview_path,
                images_to_remove: analysis.images.decorative_images.len(),
                images_to_keep: analysis.images.kept_count(),
                recommendations: analysis.preview.recommendations.clone(),
            })
        }
        Err(e) => {
            warn!("{}", e);
            StepOutcome::failed(e)
        }
    };
    if let Some(cb) = &config.progress_callback {
        cb.on_preview(&file_name, &analysis.preview);
    }

    // ── Step 5: Final cleaning ───────────────────────────────────────────
    let (final_step, redaction, cleaned) = if preview_only {
        info!("Preview mode: no changes applied");
        (
            StepOutcome::skipped("preview mode"),
            RedactionLog::default(),
            None,
        )
    } else {
        notify(config, &file_name, CleaningStep::FinalCleaning);
        match final_clean(&ocr_source, &stem, &analysis, config).await {
            Ok((step, log, path)) => (step, log, Some(path)),
            Err(e) => {
                warn!("Final cleaning failed: {}", e);
                (StepOutcome::failed(e), RedactionLog::default(), None)
            }
        }
    };

    // ── Step 6: Text extraction ──────────────────────────────────────────
    notify(config, &file_name, CleaningStep::TextExtraction);
    let text_source = match &cleaned {
        Some(path) if path.exists() => path.clone(),
        _ => ocr_source.clone(),
    };
    let text_step = match extract_outputs(&text_source, &stem, &analysis.detection, config).await {
        Ok(step) => StepOutcome::Completed(step),
        Err(e) => {
            warn!("Text extraction failed: {}", e);
            StepOutcome::failed(e)
        }
    };

    let steps = StepReports {
        ocr: ocr_step,
        header_footer_detection: detection_step,
        image_analysis: image_step,
        preview: preview_step,
        final_cleaning: final_step,
        text_extraction: text_step,
    };
    let status = if steps.has_errors() {
        DocumentStatus::CompletedWithErrors
    } else {
        DocumentStatus::Completed
    };
    let duration = started.elapsed().as_secs_f64();
    info!("Finished {} in {:.2}s", file_name, duration);

    Ok(DocumentReport {
        file_name,
        language,
        start_time,
        end_time: timestamp(),
        duration_seconds: (duration * 100.0).round() / 100.0,
        versions: ArtifactPaths {
            raw,
            ocr: ocr_source,
            cleaned,
        },
        mode: if preview_only {
            RunMode::PreviewOnly
        } else {
            RunMode::Full
        },
        steps,
        redaction,
        status,
        preview: Some(analysis.preview),
    })
}

/// Synchronous wrapper around [`clean_document`].
///
/// Creates a temporary tokio runtime internally.
pub fn clean_sync(
    input_path: impl AsRef<Path>,
    config: &CleaningConfig,
) -> Result<DocumentReport, CleanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CleanError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(clean_document(input_path, config))
}

// ── Batch ────────────────────────────────────────────────────────────────

/// Clean every PDF in `config.input_dir` and write the combined report.
pub async fn clean_directory(config: &CleaningConfig) -> Result<BatchReport, CleanError> {
    let files = input::discover_pdfs(&config.input_dir)?;
    info!(
        "Found {} PDF files in {}",
        files.len(),
        config.input_dir.display()
    );
    clean_files(files, config).await
}

/// Keep the first path for each file name. Later paths sharing a name would
/// overwrite its outputs and its report entry, so they become failures.
fn split_name_collisions(paths: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<DocumentFailure>) {
    let mut seen: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut unique = Vec::with_capacity(paths.len());
    let mut failures = Vec::new();
    for path in paths {
        let name = input::file_name(&path);
        match seen.get(&name) {
            Some(first) => {
                warn!("Skipping {}: same file name as {}", path.display(), first.display());
                failures.push(DocumentFailure {
                    error: format!(
                        "Duplicate file name: {} was already processed from {}",
                        path.display(),
                        first.display()
                    ),
                    file_name: name,
                });
            }
            None => {
                seen.insert(name, path.clone());
                unique.push(path);
            }
        }
    }
    (unique, failures)
}

/// Clean `paths` one after another and write
/// `{report_dir}/cleaning_report.json`.
///
/// A fatal error for one document is recorded in
/// [`BatchReport::failures`]; the batch continues with the next file.
pub async fn clean_files(
    paths: Vec<PathBuf>,
    config: &CleaningConfig,
) -> Result<BatchReport, CleanError> {
    let total = paths.len();
    if let Some(cb) = &config.progress_callback {
        cb.on_batch_start(total);
    }

    let (paths, mut failures) = split_name_collisions(paths);
    let names: Vec<String> = paths.iter().map(|p| input::file_name(p)).collect();
    let mut results = clean_stream(paths, config).zip(stream::iter(names));

    let mut files = BTreeMap::new();
    while let Some((result, file_name)) = results.next().await {
        match result {
            Ok(report) => {
                files.insert(file_name, report);
            }
            Err(e) => failures.push(DocumentFailure {
                file_name,
                error: e.to_string(),
            }),
        }
    }

    let report = BatchReport {
        total_files: total,
        processed: files.len(),
        failures,
        preview_mode: config.preview.preview_only,
        timestamp: timestamp(),
        files,
    };
    let path = config.report_dir.join(BATCH_REPORT_FILE);
    save_json(&path, &report).await?;
    info!(
        "Batch complete: {}/{} files processed, report at {}",
        report.processed,
        total,
        path.display()
    );

    if let Some(cb) = &config.progress_callback {
        cb.on_batch_complete(total, report.processed);
    }
    Ok(report)
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn notify(config: &CleaningConfig, file_name: &str, step: CleaningStep) {
    debug!("{}: {}", file_name, step);
    if let Some(cb) = &config.progress_callback {
        cb.on_step(file_name, step);
    }
}

async fn create_dir(dir: &Path) -> Result<(), CleanError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| CleanError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })
}

async fn copy_file(from: &Path, to: &Path) -> Result<(), CleanError> {
    tokio::fs::copy(from, to)
        .await
        .map(|_| ())
        .map_err(|e| CleanError::OutputWriteFailed {
            path: to.to_path_buf(),
            source: e,
        })
}

fn detection_outcome(detection: &DetectionResult) -> StepOutcome<DetectionStep> {
    match detection.algorithm_used {
        Some(algorithm) if !detection.is_failed() => StepOutcome::Completed(DetectionStep {
            algorithm_used: algorithm,
            consistency_score: detection.consistency_score,
            headers: detection.headers.clone(),
            footers: detection.footers.clone(),
            sampled_pages: detection.sampled_pages,
            evaluated: detection.evaluated.clone(),
        }),
        _ => StepOutcome::failed(format!(
            "all detection algorithms failed: {}",
            detection.errors().join("; ")
        )),
    }
}

/// Open `path` with pdfium and run [`analyze`] on a blocking thread.
async fn analyze_file(
    path: &Path,
    config: &CleaningConfig,
    language: &str,
) -> Result<Analysis, CleanError> {
    let path = path.to_path_buf();
    let config = config.clone();
    let recognizer = TesseractRecognizer::new(config.ocr.tesseract_command.clone(), language);

    tokio::task::spawn_blocking(move || {
        let pdfium = pdf::bind_pdfium()?;
        let document = PdfiumDocument::open(&pdfium, &path)?;
        Ok::<_, CleanError>(analyze(&document, &recognizer, &config))
    })
    .await
    .map_err(|e| CleanError::Internal(format!("Analysis task panicked: {}", e)))?
}

enum Overlay {
    Text(PatternSet),
    Images(Vec<ImageRecord>),
}

/// Open `input`, paint one kind of overlay and save to `output`.
async fn overlay_file(input: &Path, output: &Path, overlay: Overlay) -> Result<usize, CleanError> {
    let input = input.to_path_buf();
    let output = output.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let pdfium = pdf::bind_pdfium()?;
        let mut document = PdfiumDocument::open(&pdfium, &input)?;
        let covered = match &overlay {
            Overlay::Text(patterns) => redact::redact_text(&mut document, patterns),
            Overlay::Images(records) => redact::redact_images(&mut document, records),
        };
        document.save(&output)?;
        Ok::<_, CleanError>(covered)
    })
    .await
    .map_err(|e| CleanError::Internal(format!("Redaction task panicked: {}", e)))?
}

/// Header/footer overlay into a temp file, then decorative-image overlay
/// into `{stem}_cleaned.pdf`. A failed pass copies its input forward.
async fn final_clean(
    source: &Path,
    stem: &str,
    analysis: &Analysis,
    config: &CleaningConfig,
) -> Result<(StepOutcome<FinalCleaningStep>, RedactionLog, PathBuf), CleanError> {
    let temp = config.output_dir.join(format!("{stem}_temp_cleaned.pdf"));
    let cleaned = config.output_dir.join(format!("{stem}_cleaned.pdf"));
    let mut errors = Vec::new();

    let patterns = PatternSet::new(&analysis.detection.headers, &analysis.detection.footers);
    let text_spans = match overlay_file(source, &temp, Overlay::Text(patterns)).await {
        Ok(n) => n,
        Err(e) => {
            warn!("Header/footer removal failed, keeping text as is: {}", e);
            errors.push(format!("header/footer removal: {e}"));
            copy_file(source, &temp).await?;
            0
        }
    };

    let images = if !config.images.remove_decorative {
        info!("Image removal disabled in config");
        copy_file(&temp, &cleaned).await?;
        0
    } else {
        let decorative = analysis.images.decorative_images.clone();
        match overlay_file(&temp, &cleaned, Overlay::Images(decorative)).await {
            Ok(n) => n,
            Err(e) => {
                warn!("Image removal failed, keeping images: {}", e);
                errors.push(format!("image removal: {e}"));
                copy_file(&temp, &cleaned).await?;
                0
            }
        }
    };

    if let Err(e) = tokio::fs::remove_file(&temp).await {
        debug!("Could not remove {}: {}", temp.display(), e);
    }

    let log = RedactionLog { text_spans, images };
    info!(
        "Final cleaning: {} spans and {} images covered → {}",
        log.text_spans,
        log.images,
        cleaned.display()
    );
    let details = FinalCleaningStep {
        output: cleaned.clone(),
        text_spans_redacted: text_spans,
        images_removed: images,
        errors,
    };
    let step = if details.errors.is_empty() {
        StepOutcome::Completed(details)
    } else {
        StepOutcome::Partial(details)
    };
    Ok((step, log, cleaned))
}

/// Extract text and Markdown from `source` and write the text artefacts.
async fn extract_outputs(
    source: &Path,
    stem: &str,
    detection: &DetectionResult,
    config: &CleaningConfig,
) -> Result<TextExtractionStep, CleanError> {
    let path = source.to_path_buf();
    let patterns = PatternSet::new(&detection.headers, &detection.footers);
    let text_settings = config.text.clone();

    let (extracted, structured): (ExtractedText, Option<StructuredText>) =
        tokio::task::spawn_blocking(move || {
            let pdfium = pdf::bind_pdfium()?;
            let document = PdfiumDocument::open(&pdfium, &path)?;
            let extracted = extract::extract_text(&document, &patterns, &text_settings);
            let structured = text_settings
                .enable_markdown
                .then(|| markdown::structure_document(&document, &text_settings));
            Ok::<_, CleanError>((extracted, structured))
        })
        .await
        .map_err(|e| CleanError::Internal(format!("Extraction task panicked: {}", e)))??;

    let text_file = config.output_dir.join(format!("{stem}_cleaned.txt"));
    write_atomic(&text_file, &extracted.text).await?;

    let (chunk_file, chunks) = if config.output.generate_chunk_simulation {
        let chunks =
            extract::chunk_simulation(&extracted.text, config.output.simulation_chunk_size);
        let path = config
            .output_dir
            .join(format!("{stem}_chunk_simulation.txt"));
        write_atomic(&path, extract::render_chunk_simulation(&chunks)).await?;
        (Some(path), chunks.len())
    } else {
        (None, 0)
    };

    let markdown_file = match &structured {
        Some(s) => {
            let path = config.output_dir.join(format!("{stem}_structured.md"));
            write_atomic(&path, &s.markdown).await?;
            Some(path)
        }
        None => None,
    };

    Ok(TextExtractionStep {
        source: source.to_path_buf(),
        text_file,
        characters: extracted.text.chars().count(),
        total_pages: extracted.total_pages,
        rtl_pages: extracted.rtl_pages.len(),
        ltr_pages: extracted.ltr_pages.len(),
        chunk_file,
        chunks,
        markdown_file,
        structure: structured.as_ref().map(|s| s.structure),
        noise_cleaning: structured.as_ref().map(|s| s.cleaning),
    })
}
