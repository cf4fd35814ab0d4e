//! Vector index abstraction and the exact brute-force implementation.
//!
//! A corpus is indexed once per ingestion and never updated afterwards, so
//! the trait only exposes reads. An approximate graph index can be dropped in
//! behind the same trait without changing what callers observe.

use super::types::{Chunk, IndexedVector, SearchResult};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("cannot build an index from an empty corpus")]
    EmptyCorpus,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Read interface over an indexed corpus.
pub trait VectorIndex: Send + Sync {
    /// Returns up to `k` chunks ordered by descending cosine similarity.
    ///
    /// Fails with [`IndexError::InvalidArgument`] when `k` is zero or the
    /// query has the wrong dimensionality.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>>;

    /// Dimensionality shared by every stored vector.
    fn dimension(&self) -> usize;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All chunks in insertion order.
    fn chunks(&self) -> Vec<&Chunk>;
}

/// Exact nearest-neighbour search by scanning every vector.
///
/// Vectors are normalised on insertion, so a search is one dot product per
/// entry. Ties are broken by insertion order, which keeps results stable
/// across repeated searches.
#[derive(Debug)]
pub struct BruteForceIndex {
    entries: Vec<IndexedVector>,
    dimension: usize,
    next_id: u64,
}

impl BruteForceIndex {
    /// Builds an index from chunks and their embeddings.
    ///
    /// The first embedding fixes the dimensionality for the whole index.
    pub fn build(vectors: Vec<(Chunk, Vec<f32>)>) -> Result<Self> {
        let dimension = match vectors.first() {
            Some((_, vector)) if !vector.is_empty() => vector.len(),
            Some(_) => {
                return Err(IndexError::InvalidArgument("embeddings must not be empty".into()))
            }
            None => return Err(IndexError::EmptyCorpus),
        };

        let mut index = Self {
            entries: Vec::with_capacity(vectors.len()),
            dimension,
            next_id: 0,
        };
        for (chunk, vector) in vectors {
            index.insert(chunk, vector)?;
        }
        Ok(index)
    }

    fn insert(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<u64> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if !all_finite(&vector) {
            return Err(IndexError::InvalidArgument(
                "embedding contains NaN or infinite values".into(),
            ));
        }

        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(IndexedVector {
            id,
            vector: normalize(vector),
            chunk,
        });
        Ok(id)
    }

    /// Looks an entry up by its handle.
    pub fn get(&self, id: u64) -> Option<&IndexedVector> {
        // ids are assigned densely in insertion order
        usize::try_from(id).ok().and_then(|i| self.entries.get(i))
    }
}

impl VectorIndex for BruteForceIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(IndexError::InvalidArgument("k must be at least 1".into()));
        }
        if query.len() != self.dimension {
            return Err(IndexError::InvalidArgument(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dimension
            )));
        }
        if !all_finite(query) {
            return Err(IndexError::InvalidArgument(
                "query contains NaN or infinite values".into(),
            ));
        }

        let query = normalize(query.to_vec());
        let mut scored: Vec<(f32, &IndexedVector)> = self
            .entries
            .iter()
            .map(|entry| (dot(&query, &entry.vector), entry))
            .collect();

        scored.sort_by(|(a_score, a), (b_score, b)| {
            b_score.total_cmp(a_score).then(a.id.cmp(&b.id))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, entry)| SearchResult {
                id: entry.id,
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn chunks(&self) -> Vec<&Chunk> {
        self.entries.iter().map(|entry| &entry.chunk).collect()
    }
}

/// Scales a vector to unit length; the zero vector stays zero.
fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
    vector
}

fn all_finite(vector: &[f32]) -> bool {
    vector.iter().all(|x| x.is_finite())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
