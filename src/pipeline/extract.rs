//! Text extraction: PDF pages → one normalised line of text.
//!
//! pdfium is not async-safe, so [`PdfiumExtractor`] runs inside
//! `spawn_blocking` like every other pdfium call in this crate. Pages are
//! read in order and joined with a newline; [`normalize_whitespace`] then
//! collapses every whitespace run (including those newlines) into a single
//! space.

use crate::error::ExtractError;
use crate::pipeline::input;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extracts plain text from a document on disk.
///
/// An `Ok` with blank text is still a failed extraction as far as the
/// controller is concerned; implementations may return either.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Collapse all whitespace runs to single spaces and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// [`TextExtractor`] backed by the pdfium library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    /// Library file or directory containing it; system lookup when `None`.
    lib_path: Option<PathBuf>,
}

impl PdfiumExtractor {
    pub fn new(lib_path: Option<PathBuf>) -> Self {
        Self { lib_path }
    }
}

#[async_trait]
impl TextExtractor for PdfiumExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let path = input::resolve_local(path)?;
        let lib_path = self.lib_path.clone();

        tokio::task::spawn_blocking(move || extract_blocking(&path, lib_path.as_deref()))
            .await
            .map_err(|e| ExtractError::Internal(format!("Extraction task panicked: {}", e)))?
    }
}

fn bind(lib_path: Option<&Path>) -> Result<Pdfium, ExtractError> {
    let bindings = match lib_path {
        Some(p) if p.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(p))
        }
        Some(p) => Pdfium::bind_to_library(p),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ExtractError::Binding(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of text extraction.
fn extract_blocking(pdf_path: &Path, lib_path: Option<&Path>) -> Result<String, ExtractError> {
    let pdfium = bind(lib_path)?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| ExtractError::Corrupt {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    if total_pages == 0 {
        return Err(ExtractError::Empty {
            path: pdf_path.to_path_buf(),
        });
    }

    let mut raw = String::new();
    for (idx, page) in pages.iter().enumerate() {
        let text = page.text().map_err(|e| ExtractError::Corrupt {
            path: pdf_path.to_path_buf(),
            detail: format!("page {}: {:?}", idx + 1, e),
        })?;
        let text = text.all();
        debug!("Page {}: {} chars", idx + 1, text.len());
        if !text.is_empty() {
            raw.push_str(&text);
            raw.push('\n');
        }
    }

    let normalised = normalize_whitespace(&raw);
    info!(
        "Extraction complete: {} raw chars → {} normalised",
        raw.len(),
        normalised.len()
    );
    Ok(normalised)
}
