//! Text extraction from uploaded files.
//!
//! Extraction only turns bytes into text. Whether that text is worth indexing
//! (for instance a scanned PDF yielding nothing) is decided at ingestion.

use async_trait::async_trait;
use lopdf::Document;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unparsable document: {0}")]
    Unparsable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExtractError>;

/// Format a piece of text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Raw,
}

impl DocumentKind {
    /// Value stored under the `type` metadata key of every chunk.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Raw => "raw",
        }
    }
}

/// Text pulled out of a file.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub text: String,
    pub kind: DocumentKind,
    /// Page count, for paginated formats
    pub pages: Option<usize>,
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: Vec<u8>) -> Result<ExtractedText>;
}

/// UTF-8 text files. Invalid sequences are replaced rather than rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, bytes: Vec<u8>) -> Result<ExtractedText> {
        if bytes.contains(&0) {
            return Err(ExtractError::Unparsable("file looks binary, not text".into()));
        }
        Ok(ExtractedText {
            text: String::from_utf8_lossy(&bytes).into_owned(),
            kind: DocumentKind::Raw,
            pages: None,
        })
    }
}

/// PDF text layer extraction via `lopdf`.
///
/// Pages whose text cannot be decoded contribute nothing instead of failing
/// the whole document.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

#[async_trait]
impl TextExtractor for PdfExtractor {
    async fn extract(&self, bytes: Vec<u8>) -> Result<ExtractedText> {
        tokio::task::spawn_blocking(move || extract_pdf(&bytes))
            .await
            .map_err(|e| ExtractError::Unparsable(format!("extraction task failed: {}", e)))?
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<ExtractedText> {
    let doc = Document::load_mem(bytes).map_err(|e| ExtractError::Unparsable(e.to_string()))?;

    let page_map = doc.get_pages();
    let mut page_numbers: Vec<u32> = page_map.keys().copied().collect();
    page_numbers.sort_unstable();

    let pages: Vec<String> = page_numbers
        .iter()
        .map(|number| doc.extract_text(&[*number]).unwrap_or_default())
        .collect();
    debug!(pages = pages.len(), "Extracted PDF text layer");

    Ok(ExtractedText {
        text: pages.join("\n\n"),
        kind: DocumentKind::Pdf,
        pages: Some(page_numbers.len()),
    })
}

/// Picks an extractor from the file extension.
pub fn extractor_for_path(path: &Path) -> Box<dyn TextExtractor> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        Box::new(PdfExtractor)
    } else {
        Box::new(PlainTextExtractor)
    }
}

/// Reads a file and extracts its text.
pub async fn extract_file(path: &Path) -> Result<ExtractedText> {
    let bytes = tokio::fs::read(path).await?;
    extractor_for_path(path).extract(bytes).await
}
