//! pdfium adapter: opens files and exposes them as a [`BlockSource`] and a
//! [`RedactionSurface`].
//!
//! pdfium keeps thread-local state and every call blocks, so the async entry
//! points here move the work onto `tokio::task::spawn_blocking`. The
//! analysis stage in [`crate::clean`] binds its own [`Pdfium`] inside one
//! blocking task and drives the engines through [`PdfiumDocument`].
//!
//! pdfium reports coordinates bottom-up. Everything leaving this module is
//! converted to the top-down frame used by [`crate::pipeline::source`].

use crate::error::{CleanError, PageError};
use crate::pipeline::encode::encode_png;
use crate::pipeline::source::{
    group_placements, merge_spans_into_blocks, BlockSource, PageBlock, PageImage, PageSize,
    RedactionSurface, Rect, TextRun, TextSpan,
};
use pdfium_render::prelude::*;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit pdfium shared library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

// ── Binding ──────────────────────────────────────────────────────────────

/// Bind to a pdfium library.
///
/// Lookup order: `$PDFIUM_LIB_PATH`, the current directory, then the
/// system library path.
pub fn bind_pdfium() -> Result<Pdfium, CleanError> {
    if let Ok(path) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        let path = PathBuf::from(path);
        let lib = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&path)
        } else {
            path.clone()
        };
        match Pdfium::bind_to_library(&lib) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", lib.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => warn!("{} set but binding failed: {:?}", PDFIUM_LIB_PATH_ENV, e),
        }
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| CleanError::PdfiumBindingFailed(format!("{:?}", e)))
}

/// Open a PDF, mapping pdfium failures to typed errors.
pub fn open_document<'a>(pdfium: &'a Pdfium, path: &Path) -> Result<PdfDocument<'a>, CleanError> {
    pdfium.load_pdf_from_file(path, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            CleanError::PasswordRequired {
                path: path.to_path_buf(),
            }
        } else {
            CleanError::CorruptPdf {
                path: path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

fn save_document(document: &PdfDocument<'_>, path: &Path) -> Result<(), CleanError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CleanError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    document
        .save_to_file(path)
        .map_err(|e| CleanError::SaveFailed {
            path: path.to_path_buf(),
            detail: format!("{:?}", e),
        })
}

// ── Document adapter ─────────────────────────────────────────────────────

/// An open pdfium document seen through the engine traits.
pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
    path: PathBuf,
}

impl<'a> PdfiumDocument<'a> {
    pub fn open(pdfium: &'a Pdfium, path: &Path) -> Result<Self, CleanError> {
        let document = open_document(pdfium, path)?;
        info!(
            "PDF loaded: {} ({} pages)",
            path.display(),
            document.pages().len()
        );
        Ok(Self {
            document,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the document, including any overlays, to `path`.
    pub fn save(&self, path: &Path) -> Result<(), CleanError> {
        save_document(&self.document, path)
    }

    fn page(&self, index: usize) -> Result<PdfPage<'a>, PageError> {
        self.document
            .pages()
            .get(index as u16)
            .map_err(|e| PageError::BlocksUnavailable {
                page: index,
                detail: format!("{:?}", e),
            })
    }

    fn text_error(index: usize, e: PdfiumError) -> PageError {
        PageError::BlocksUnavailable {
            page: index,
            detail: format!("{:?}", e),
        }
    }
}

/// Convert a bottom-up pdfium rectangle to the top-down frame.
fn to_top_down(rect: &PdfRect, page_height: f32) -> Rect {
    Rect::new(
        rect.left().value,
        page_height - rect.top().value,
        rect.right().value,
        page_height - rect.bottom().value,
    )
}

fn to_bottom_up(rect: &Rect, page_height: f32) -> PdfRect {
    PdfRect::new_from_values(
        page_height - rect.y1,
        rect.x0,
        page_height - rect.y0,
        rect.x1,
    )
}

impl BlockSource for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_size(&self, page: usize) -> Result<PageSize, PageError> {
        let p = self.page(page)?;
        Ok(PageSize {
            width: p.width().value,
            height: p.height().value,
        })
    }

    fn page_blocks(&self, page: usize) -> Result<Vec<PageBlock>, PageError> {
        Ok(merge_spans_into_blocks(&self.page_spans(page)?))
    }

    fn page_text(&self, page: usize) -> Result<String, PageError> {
        let p = self.page(page)?;
        let text = p.text().map_err(|e| Self::text_error(page, e))?;
        Ok(text.all())
    }

    fn page_images(&self, page: usize) -> Result<Vec<PageImage>, PageError> {
        let p = self.page(page)?;
        let height = p.height().value;
        let mut images = Vec::new();

        for (index, object) in p.objects().iter().enumerate() {
            let Some(image) = object.as_image_object() else {
                continue;
            };
            let reference = index as u32;
            let rects = match object.bounds() {
                Ok(quad) => vec![to_top_down(&quad.to_rect(), height)],
                Err(e) => {
                    debug!("Page {} image {}: no bounds: {:?}", page, reference, e);
                    Vec::new()
                }
            };
            // An undecodable stream is passed on empty; the classifier keeps it.
            let bytes = match image.get_raw_image() {
                Ok(raw) => encode_png(&raw).unwrap_or_else(|e| {
                    debug!("Page {} image {}: re-encode failed: {}", page, reference, e);
                    Vec::new()
                }),
                Err(e) => {
                    debug!("Page {} image {}: raw image unavailable: {:?}", page, reference, e);
                    Vec::new()
                }
            };
            images.push(PageImage {
                reference,
                rects,
                bytes,
            });
        }
        Ok(group_placements(images))
    }

    fn page_runs(&self, page: usize) -> Result<Vec<TextRun>, PageError> {
        let p = self.page(page)?;
        let height = p.height().value;
        let runs = p
            .objects()
            .iter()
            .filter_map(|object| {
                let text_object = object.as_text_object()?;
                let text = text_object.text();
                if text.trim().is_empty() {
                    return None;
                }
                let rect = to_top_down(&object.bounds().ok()?.to_rect(), height);
                Some(TextRun {
                    x0: rect.x0,
                    top: rect.y0,
                    text,
                    font_size: Some(text_object.scaled_font_size().value),
                })
            })
            .collect();
        Ok(runs)
    }
}

impl RedactionSurface for PdfiumDocument<'_> {
    fn page_spans(&self, page: usize) -> Result<Vec<TextSpan>, PageError> {
        let p = self.page(page)?;
        let height = p.height().value;
        let text = p.text().map_err(|e| Self::text_error(page, e))?;
        let spans = text
            .segments()
            .iter()
            .map(|segment| TextSpan {
                rect: to_top_down(&segment.bounds(), height),
                text: segment.text(),
            })
            .filter(|span| !span.text.trim().is_empty())
            .collect();
        Ok(spans)
    }

    fn cover(&mut self, page: usize, rect: Rect) -> Result<(), PageError> {
        let redaction_error = |detail: String| PageError::RedactionFailed { page, detail };
        let mut p = self
            .page(page)
            .map_err(|e| redaction_error(e.to_string()))?;
        let height = p.height().value;
        p.objects_mut()
            .create_path_object_rect(
                to_bottom_up(&rect, height),
                None,
                None,
                Some(PdfColor::WHITE),
            )
            .map(|_| ())
            .map_err(|e| redaction_error(format!("{:?}", e)))
    }
}

// ── Whole-file operations ────────────────────────────────────────────────

/// Count the pages of a PDF.
pub async fn page_count(path: &Path) -> Result<usize, CleanError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || page_count_blocking(&path))
        .await
        .map_err(|e| CleanError::Internal(format!("Page count task panicked: {}", e)))?
}

pub fn page_count_blocking(path: &Path) -> Result<usize, CleanError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, path)?;
    Ok(document.pages().len() as usize)
}

/// 0-based inclusive page ranges of at most `chunk_size` pages.
pub fn chunk_ranges(total_pages: usize, chunk_size: usize) -> Vec<RangeInclusive<usize>> {
    let size = chunk_size.max(1);
    (0..total_pages)
        .step_by(size)
        .map(|start| start..=(start + size).min(total_pages) - 1)
        .collect()
}

/// Split `path` into `chunk_{i}.pdf` files under `dir`, in page order.
pub async fn split_into_chunks(
    path: &Path,
    dir: &Path,
    chunk_size: usize,
) -> Result<Vec<PathBuf>, CleanError> {
    let path = path.to_path_buf();
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || split_into_chunks_blocking(&path, &dir, chunk_size))
        .await
        .map_err(|e| CleanError::Internal(format!("Split task panicked: {}", e)))?
}

pub fn split_into_chunks_blocking(
    path: &Path,
    dir: &Path,
    chunk_size: usize,
) -> Result<Vec<PathBuf>, CleanError> {
    let pdfium = bind_pdfium()?;
    let source = open_document(&pdfium, path)?;
    let total = source.pages().len() as usize;

    let mut chunks = Vec::new();
    for (i, range) in chunk_ranges(total, chunk_size).into_iter().enumerate() {
        let chunk_path = dir.join(format!("chunk_{}.pdf", i));
        let mut chunk = pdfium
            .create_new_pdf()
            .map_err(|e| CleanError::Internal(format!("Cannot create chunk document: {:?}", e)))?;
        chunk
            .pages_mut()
            .copy_page_range_from_document(
                &source,
                (*range.start() as u16)..=(*range.end() as u16),
                0,
            )
            .map_err(|e| CleanError::Internal(format!("Cannot copy pages {:?}: {:?}", range, e)))?;
        save_document(&chunk, &chunk_path)?;
        debug!(
            "Chunk {} → pages {}-{} ({})",
            i,
            range.start() + 1,
            range.end() + 1,
            chunk_path.display()
        );
        chunks.push(chunk_path);
    }
    info!("Split {} pages into {} chunks", total, chunks.len());
    Ok(chunks)
}

/// Concatenate `parts` in order into `output`.
pub async fn merge_documents(parts: &[PathBuf], output: &Path) -> Result<(), CleanError> {
    let parts = parts.to_vec();
    let output = output.to_path_buf();
    tokio::task::spawn_blocking(move || merge_documents_blocking(&parts, &output))
        .await
        .map_err(|e| CleanError::Internal(format!("Merge task panicked: {}", e)))?
}

pub fn merge_documents_blocking(parts: &[PathBuf], output: &Path) -> Result<(), CleanError> {
    let pdfium = bind_pdfium()?;
    let mut merged = pdfium
        .create_new_pdf()
        .map_err(|e| CleanError::Internal(format!("Cannot create merged document: {:?}", e)))?;
    for part in parts {
        let document = open_document(&pdfium, part)?;
        merged
            .pages_mut()
            .append(&document)
            .map_err(|e| CleanError::Internal(format!("Cannot append {}: {:?}", part.display(), e)))?;
    }
    save_document(&merged, output)?;
    info!("Merged {} parts into {}", parts.len(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ranges_cover_every_page_once() {
        assert_eq!(chunk_ranges(250, 100), vec![0..=99, 100..=199, 200..=249]);
        assert_eq!(chunk_ranges(100, 100), vec![0..=99]);
        assert_eq!(chunk_ranges(3, 1), vec![0..=0, 1..=1, 2..=2]);
        assert!(chunk_ranges(0, 100).is_empty());
    }

    #[test]
    fn zero_chunk_size_is_treated_as_one() {
        assert_eq!(chunk_ranges(2, 0).len(), 2);
    }

    #[test]
    fn coordinate_frames_round_trip() {
        let r = Rect::new(50.0, 20.0, 300.0, 32.0);
        let pdf = to_bottom_up(&r, 800.0);
        assert_eq!(pdf.bottom().value, 768.0);
        assert_eq!(pdf.top().value, 780.0);
        assert_eq!(to_top_down(&pdf, 800.0), r);
    }
}
