//! Recursive text chunking for RAG.
//!
//! Text is split on the coarsest separator that occurs in it (paragraphs,
//! then lines, then words, then single characters). Pieces that still exceed
//! the chunk size are split again with the next finer separator, and the
//! resulting small pieces are merged back into windows of at most
//! `chunk_size` characters that share up to `chunk_overlap` characters.
//!
//! All lengths are counted in characters, never bytes, so multi-byte text is
//! never cut inside a character.

use super::types::{Chunk, CHUNK_KEY};
use crate::config::RagConfig;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

/// Separators tried in order, coarsest first. The empty separator splits
/// into single characters and always applies.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkerError {
    #[error("chunk size must be positive")]
    ZeroChunkSize,

    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

pub type Result<T> = std::result::Result<T, ChunkerError>;

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Chunker {
    /// Creates a chunker, refusing sizes that could never make progress.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ChunkerError::ZeroChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkerError::OverlapTooLarge {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits several documents into chunks carrying `metadata`.
    ///
    /// Chunks come out in document order, then in position order within each
    /// document, and are tagged with their position under the `chunk` key.
    pub fn split<S: AsRef<str>>(
        &self,
        documents: &[S],
        metadata: &HashMap<String, String>,
    ) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|document| {
                self.split_text(document.as_ref())
                    .into_iter()
                    .enumerate()
                    .map(|(position, text)| Chunk {
                        text,
                        metadata: metadata.clone(),
                    }
                    .with_metadata(CHUNK_KEY, position.to_string()))
            })
            .collect()
    }

    /// Splits one text into overlapping chunks.
    ///
    /// Whitespace-only text produces no chunks; any other text no longer than
    /// `chunk_size` produces exactly one.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if char_len(text) <= self.chunk_size {
            let trimmed = text.trim();
            return if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_string()]
            };
        }

        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (index, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(sep.as_str()))
            .map(|(i, sep)| (i, sep.as_str()))
            .unwrap_or((separators.len(), ""));
        let finer = separators.get(index + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|piece| !piece.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, separator));
                pending.clear();
            }

            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, separator));
        }

        chunks
    }

    /// Greedily packs small pieces into windows, carrying an overlapping tail
    /// from each window into the next.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { separator_len };

            if !window.is_empty() && total + len + joiner > self.chunk_size {
                if let Some(chunk) = join_window(&window, separator) {
                    chunks.push(chunk);
                }

                // Keep at most `chunk_overlap` characters, and only as many as
                // still leave room for the incoming piece.
                while total > self.chunk_overlap
                    || (total > 0 && total + len + separator_len > self.chunk_size)
                {
                    let Some((_, first_len)) = window.pop_front() else {
                        break;
                    };
                    total -= first_len + if window.is_empty() { 0 } else { separator_len };
                }
            }

            total += len + if window.is_empty() { 0 } else { separator_len };
            window.push_back((piece, len));
        }

        if let Some(chunk) = join_window(&window, separator) {
            chunks.push(chunk);
        }

        chunks
    }
}

fn join_window(window: &VecDeque<(&str, usize)>, separator: &str) -> Option<String> {
    let joined = window
        .iter()
        .map(|(piece, _)| *piece)
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
