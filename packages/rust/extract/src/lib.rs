//! Raw text extraction from PDF files.
//!
//! Parsing is delegated to `pdf-extract`. This crate only adapts its output
//! into [`RawText`] and turns every failure, panics included, into a
//! [`PdfKbError::Extraction`] so a bad file never takes the run down.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::{debug, instrument};

use pdfkb_shared::{ExtractMode, PdfKbError, RawText, Result};

/// Source of raw document text.
pub trait TextExtractor {
    /// The whole document as one string.
    fn extract_text(&self, path: &Path) -> Result<String>;

    /// One string per page, in page order.
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>>;

    /// Extract in the shape requested by `mode`.
    fn extract(&self, path: &Path, mode: ExtractMode) -> Result<RawText> {
        match mode {
            ExtractMode::Document => self.extract_text(path).map(RawText::Whole),
            ExtractMode::Pages => self.extract_pages(path).map(RawText::Pages),
        }
    }
}

/// [`TextExtractor`] backed by `pdf-extract`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    #[instrument(skip(self), fields(path = %path.display()))]
    fn extract_text(&self, path: &Path) -> Result<String> {
        ensure_readable(path)?;
        let text = guarded(path, || pdf_extract::extract_text(path))?;
        debug!(chars = text.len(), "extracted document text");
        Ok(text)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
        ensure_readable(path)?;
        let pages = guarded(path, || pdf_extract::extract_text_by_pages(path))?;
        debug!(pages = pages.len(), "extracted page text");
        Ok(pages)
    }
}

/// File label used in record ids (`<filename>_<ordinal>`).
pub fn document_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn ensure_readable(path: &Path) -> Result<()> {
    let meta = std::fs::metadata(path).map_err(|e| PdfKbError::extraction(path, e.to_string()))?;
    if !meta.is_file() {
        return Err(PdfKbError::extraction(path, "not a regular file"));
    }
    Ok(())
}

/// Run a `pdf-extract` call, mapping both its errors and its panics.
fn guarded<T, E, F>(path: &Path, f: F) -> Result<T>
where
    E: std::fmt::Display,
    F: FnOnce() -> std::result::Result<T, E>,
{
    // pdf-extract panics on some malformed documents.
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(PdfKbError::extraction(path, e.to_string())),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "PDF parser panicked".to_string());
            Err(PdfKbError::extraction(path, message))
        }
    }
}
