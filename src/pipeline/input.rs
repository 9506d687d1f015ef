//! Input resolution: validate a user-supplied path and discover batch inputs.
//!
//! pdfium crashes or reports unhelpful errors on non-PDF input, so every
//! file is checked for the `%PDF` magic bytes before any stage touches it.

use crate::error::CleanError;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` exists, is readable and starts with `%PDF`.
pub fn resolve_local(path: &Path) -> Result<PathBuf, CleanError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(CleanError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(CleanError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            return Err(CleanError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(CleanError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// Every `*.pdf` file directly inside `dir`, sorted by file name.
///
/// The extension match is case-insensitive. Fails with
/// [`CleanError::NoInputFiles`] when there are none.
pub fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>, CleanError> {
    let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => CleanError::PermissionDenied {
            path: dir.to_path_buf(),
        },
        _ => CleanError::NoInputFiles {
            dir: dir.to_path_buf(),
        },
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_pdf_name(p))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if files.is_empty() {
        return Err(CleanError::NoInputFiles {
            dir: dir.to_path_buf(),
        });
    }
    debug!("Found {} PDFs in {}", files.len(), dir.display());
    Ok(files)
}

fn is_pdf_name(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// File name without the extension, used to name every artefact.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

/// File name with the extension, used as the report key.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_file() {
        let err = resolve_local(Path::new("/nonexistent/file.pdf")).unwrap_err();
        assert!(matches!(err, CleanError::FileNotFound { .. }));
    }

    #[test]
    fn wrong_magic() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("notes.pdf");
        fs::write(&p, b"hello world").unwrap();
        match resolve_local(&p).unwrap_err() {
            CleanError::NotAPdf { magic, .. } => assert_eq!(&magic, b"hell"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn pdf_magic_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("a.pdf");
        fs::write(&p, b"%PDF-1.7\n").unwrap();
        assert_eq!(resolve_local(&p).unwrap(), p);
    }

    #[test]
    fn discovery_is_sorted_and_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "A.PDF", "c.txt", "a2.pdf"] {
            fs::write(dir.path().join(name), b"%PDF").unwrap();
        }
        fs::create_dir(dir.path().join("sub.pdf")).unwrap();
        let names: Vec<String> = discover_pdfs(dir.path())
            .unwrap()
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(names, ["A.PDF", "a2.pdf", "b.pdf"]);
    }

    #[test]
    fn empty_directory_has_no_inputs() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            discover_pdfs(dir.path()).unwrap_err(),
            CleanError::NoInputFiles { .. }
        ));
    }

    #[test]
    fn stems() {
        assert_eq!(file_stem(Path::new("in/Report 2024.pdf")), "Report 2024");
        assert_eq!(file_name(Path::new("in/Report 2024.pdf")), "Report 2024.pdf");
    }
}
