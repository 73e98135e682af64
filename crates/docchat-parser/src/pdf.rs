//! PDF document parser using pdf-extract
//!
//! Extracts the text of each page in order. A page without extractable
//! text yields an empty string instead of failing the document.

use std::path::Path;

use docchat_core::{DocChatError, Result};

use crate::{unreadable, DocumentParser, FileType, ParsedDocument};

/// PDF document parser
#[derive(Debug, Default)]
pub struct PdfParser;

impl PdfParser {
    /// Create a new PDF parser
    pub fn new() -> Self {
        Self
    }

    /// Extract the text of every page from a PDF file
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DocChatError::DocumentNotFound(path.to_path_buf()),
            _ => unreadable(path, e.to_string()),
        })?;

        Self::extract_pages_from_mem(path, &bytes)
    }

    fn extract_pages_from_mem(path: &Path, bytes: &[u8]) -> Result<Vec<String>> {
        // pdf-extract panics on some malformed inputs
        let extracted =
            std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
                .map_err(|_| unreadable(path, "PDF extraction aborted on malformed content"))?;

        extracted.map_err(|e| unreadable(path, format!("PDF parsing error: {e}")))
    }
}

impl DocumentParser for PdfParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let pages = self.extract_pages(path)?;

        let empty = pages.iter().filter(|p| p.trim().is_empty()).count();
        if empty > 0 {
            tracing::debug!(
                "{}: {empty} of {} pages have no extractable text",
                path.display(),
                pages.len()
            );
        }

        Ok(ParsedDocument::new(path.display().to_string(), FileType::Pdf).with_pages(pages))
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Pdf]
    }
}
