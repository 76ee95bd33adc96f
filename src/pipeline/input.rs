//! Input validation: make sure a user-supplied path is a readable PDF.
//!
//! Checking the `%PDF` magic bytes before handing the file to pdfium gives
//! the log a meaningful cause ("not a PDF", "permission denied") instead of
//! a generic pdfium load failure.

use crate::error::ExtractError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// True if the path has a `.pdf` extension (case-insensitive).
pub fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Validate that `path` exists, is readable and looks like a PDF.
pub fn resolve_local(path: &Path) -> Result<PathBuf, ExtractError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(ExtractError::NotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            match f.read_exact(&mut magic) {
                Ok(()) if &magic != b"%PDF" => {
                    return Err(ExtractError::NotAPdf { path, magic });
                }
                Ok(()) => {}
                // Shorter than four bytes: nothing a parser could use.
                Err(_) => return Err(ExtractError::Empty { path }),
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ExtractError::NotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn extension_check() {
        assert!(has_pdf_extension(Path::new("/tmp/a.pdf")));
        assert!(has_pdf_extension(Path::new("REPORT.PDF")));
        assert!(!has_pdf_extension(Path::new("notes.txt")));
        assert!(!has_pdf_extension(Path::new("pdf")));
    }

    #[test]
    fn missing_file() {
        let err = resolve_local(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, ExtractError::NotFound { .. }));
    }

    #[test]
    fn wrong_magic() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello world").unwrap();
        let err = resolve_local(f.path()).unwrap_err();
        assert!(matches!(err, ExtractError::NotAPdf { magic, .. } if &magic == b"hell"));
    }

    #[test]
    fn zero_length_file_is_empty() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let err = resolve_local(f.path()).unwrap_err();
        assert!(matches!(err, ExtractError::Empty { .. }));
    }

    #[test]
    fn pdf_magic_accepted() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.7\n").unwrap();
        assert_eq!(resolve_local(f.path()).unwrap(), f.path());
    }
}
