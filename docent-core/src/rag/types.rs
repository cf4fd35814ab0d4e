use crate::extract::DocumentKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Metadata key naming the document a chunk came from.
pub const SOURCE_KEY: &str = "source";
/// Metadata key holding the document kind (`pdf` or `raw`).
pub const TYPE_KEY: &str = "type";
/// Metadata key holding the chunk's position within its document.
pub const CHUNK_KEY: &str = "chunk";

/// A contiguous slice of a document, the unit of embedding and retrieval.
///
/// Chunks are never modified after the chunker creates them.
///
/// # Example
///
/// ```
/// # use docent_core::rag::Chunk;
/// let chunk = Chunk::new("Hello world")
///     .with_metadata("source", "notes.txt")
///     .with_metadata("type", "raw");
/// assert_eq!(chunk.source(), Some("notes.txt"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

/// A chunk and its embedding as held by a vector index.
#[derive(Debug, Clone)]
pub struct IndexedVector {
    /// Handle assigned at insertion; increasing and never reused within one index
    pub id: u64,
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

/// A search result containing a chunk and its similarity score.
///
/// Returned by vector search operations, ordered by descending similarity score.
/// Scores are cosine similarities in `[-1.0, 1.0]`; higher is closer.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: u64,
    pub chunk: Chunk,
    pub score: f32,
}

/// Where the current corpus came from, when it was a parsed file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provenance {
    pub source: String,
    pub kind: &'static str,
    pub pages: Option<usize>,
    /// Length of the extracted text in characters
    pub characters: usize,
    pub ingested_at: DateTime<Utc>,
}

impl Provenance {
    pub fn new(source: impl Into<String>, kind: DocumentKind, pages: Option<usize>, text: &str) -> Self {
        Self {
            source: source.into(),
            kind: kind.as_str(),
            pages,
            characters: text.chars().count(),
            ingested_at: Utc::now(),
        }
    }
}

/// Result of an ingestion.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub dimension: usize,
}

/// An answer grounded in the current corpus.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Number of retrieved fragments that made it into the prompt
    pub fragments_used: usize,
    pub provenance: Option<Provenance>,
}
