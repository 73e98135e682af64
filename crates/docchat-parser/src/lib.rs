//! docchat Parser - Document loading and chunking
//!
//! Supports loading of:
//! - PDF documents
//! - Markdown files
//! - Plain text files
//!
//! Each parser implements the `DocumentParser` trait and produces
//! a `ParsedDocument` holding the text of every page in order. The
//! `chunk` module then slices the joined text into overlapping windows
//! for embedding.

use std::path::Path;

use docchat_core::{DocChatError, Result};

pub mod chunk;
pub mod pdf;

pub use chunk::{chunk_ids, chunk_text, split_text, TextChunk};
pub use docchat_core::ChunkingConfig;
pub use pdf::PdfParser;

// ============================================================================
// Parsed Document Types
// ============================================================================

/// A parsed document with extracted page texts
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Original file path
    pub file_path: String,

    /// Detected file type
    pub file_type: FileType,

    /// Text of each page, in document order
    pub pages: Vec<String>,
}

impl ParsedDocument {
    /// Create a new parsed document
    pub fn new(file_path: impl Into<String>, file_type: FileType) -> Self {
        Self {
            file_path: file_path.into(),
            file_type,
            pages: Vec::new(),
        }
    }

    /// Set pages
    pub fn with_pages(mut self, pages: Vec<String>) -> Self {
        self.pages = pages;
        self
    }

    /// Full text: pages joined by a newline
    pub fn text(&self) -> String {
        self.pages.join("\n")
    }

    /// Number of pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Supported file types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Pdf,
    Markdown,
    PlainText,
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "md" | "markdown" => Self::Markdown,
            "txt" => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Markdown => write!(f, "markdown"),
            Self::PlainText => write!(f, "text"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ============================================================================
// Parser Trait
// ============================================================================

/// Trait for document parsers
pub trait DocumentParser: Send + Sync {
    /// Parse a document from a file path
    fn parse(&self, path: &Path) -> Result<ParsedDocument>;

    /// Get supported file types
    fn supported_types(&self) -> &[FileType];

    /// Check if this parser can handle a file type
    fn can_parse(&self, file_type: FileType) -> bool {
        self.supported_types().contains(&file_type)
    }
}

pub(crate) fn unreadable(path: &Path, message: impl Into<String>) -> DocChatError {
    DocChatError::DocumentUnreadable {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

// ============================================================================
// Parser Registry
// ============================================================================

/// Registry of available parsers
pub struct ParserRegistry {
    parsers: Vec<Box<dyn DocumentParser>>,
}

impl ParserRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Registry with the PDF and plain text parsers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(PdfParser::new());
        registry.register(PlainTextParser);
        registry
    }

    /// Register a parser
    pub fn register<P: DocumentParser + 'static>(&mut self, parser: P) {
        self.parsers.push(Box::new(parser));
    }

    /// Find a parser for a file type
    pub fn find_parser(&self, file_type: FileType) -> Option<&dyn DocumentParser> {
        self.parsers
            .iter()
            .find(|p| p.can_parse(file_type))
            .map(|p| p.as_ref())
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl DocumentParser for ParserRegistry {
    /// Parse a file using the appropriate parser
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        if !path.is_file() {
            return Err(DocChatError::DocumentNotFound(path.to_path_buf()));
        }

        let file_type = FileType::from_path(path);
        let parser = self.find_parser(file_type).ok_or_else(|| {
            unreadable(
                path,
                format!(
                    "unsupported file format: {}",
                    path.extension()
                        .and_then(|e| e.to_str())
                        .unwrap_or("none")
                ),
            )
        })?;

        let doc = parser.parse(path)?;
        tracing::debug!(
            "Parsed {} ({}): {} pages",
            doc.file_path,
            doc.file_type,
            doc.page_count()
        );
        Ok(doc)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Pdf, FileType::PlainText, FileType::Markdown]
    }
}

// ============================================================================
// Plain Text Parser
// ============================================================================

/// Plain text parser; a form feed (`\x0C`) separates pages
pub struct PlainTextParser;

impl DocumentParser for PlainTextParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DocChatError::DocumentNotFound(path.to_path_buf()),
            _ => unreadable(path, e.to_string()),
        })?;

        let content = String::from_utf8(bytes)
            .map_err(|e| unreadable(path, format!("invalid UTF-8: {e}")))?;

        let pages = content.split('\x0C').map(str::to_string).collect();

        Ok(
            ParsedDocument::new(path.display().to_string(), FileType::from_path(path))
                .with_pages(pages),
        )
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::PlainText, FileType::Markdown]
    }
}

// ============================================================================
// Tests
// ============================================================================
