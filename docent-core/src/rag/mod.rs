//! Retrieval Augmented Generation (RAG) over a single document corpus.
//!
//! # Overview
//!
//! RAG combines three steps:
//! 1. **Retrieval**: finding the chunks of the corpus closest to a question
//! 2. **Augmentation**: adding those chunks as context to the prompt
//! 3. **Generation**: the model answers using only that context
//!
//! # Architecture
//!
//! - [`RagEngine`]: owns the current corpus and runs ingestion and queries
//! - [`chunker`]: recursive text splitting into overlapping chunks
//! - [`embedder`]: text to vector embeddings through a provider
//! - [`index`]: the [`VectorIndex`] trait and the brute-force cosine index
//! - [`prompts`]: prompt templates and context assembly
//!
//! # Corpus lifecycle
//!
//! The engine starts [`CorpusState::Uninitialized`]. The first successful
//! ingestion makes it [`CorpusState::Ready`]. Every later ingestion builds a
//! complete new index off to the side and swaps it in with one write, so a
//! concurrent query sees either the old corpus or the new one, never a mix.
//! A failed ingestion leaves the previous corpus untouched.

pub mod chunker;
pub mod embedder;
pub mod index;
pub mod prompts;
mod types;

pub use chunker::{Chunker, ChunkerError};
pub use embedder::{Embedder, EmbedderError};
pub use index::{BruteForceIndex, IndexError, VectorIndex};
pub use types::{
    Answer, Chunk, IndexedVector, IngestReport, Provenance, SearchResult, CHUNK_KEY, SOURCE_KEY,
    TYPE_KEY,
};

use crate::config::{Config, RagConfig, SummaryStrategy};
use crate::extract::{DocumentKind, ExtractError};
use crate::provider::{FailureKind, Generator, Provider, ProviderError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Source name used when a caller ingests documents without naming them.
const DEFAULT_SOURCE: &str = "documents";

/// Probe text embedded to pick representative chunks for a sampled summary.
const SUMMARY_PROBE: &str = "main topic, key points and conclusions of the document";

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("The document contains no text")]
    EmptyContent,

    #[error("No document has been loaded")]
    NotInitialized,

    #[error("Unparsable document: {0}")]
    Extract(#[from] ExtractError),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("Generation failed: {0}")]
    Generation(#[from] ProviderError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

impl From<ChunkerError> for RagError {
    fn from(err: ChunkerError) -> Self {
        RagError::Configuration(err.to_string())
    }
}

impl From<crate::config::ConfigError> for RagError {
    fn from(err: crate::config::ConfigError) -> Self {
        RagError::Configuration(err.to_string())
    }
}

impl RagError {
    /// Backend failure category, when the error came from a model call.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            RagError::Generation(e) | RagError::Embedding(EmbedderError::Provider(e)) => Some(e.kind()),
            _ => None,
        }
    }

    /// A short, user-actionable suggestion for this failure.
    pub fn hint(&self) -> &'static str {
        if let Some(kind) = self.failure_kind() {
            return match kind {
                FailureKind::RateLimited => "The model backend is rate limiting requests. Wait a moment and retry.",
                FailureKind::Timeout => "The model backend took too long to respond. Retry, or raise the timeout.",
                FailureKind::InvalidCredential => "The backend rejected the credentials. Check llm.api_key.",
                FailureKind::Unreachable => "The model backend is unreachable. Check that Ollama is running at llm.base_url.",
                FailureKind::Other => "The model backend returned an error. Check the model names in the configuration.",
            };
        }

        match self {
            RagError::Configuration(_) => "Fix the configuration file and start again.",
            RagError::EmptyContent => "No text could be read. The file may be a scanned image without a text layer.",
            RagError::NotInitialized => "Load a document first.",
            RagError::Extract(ExtractError::Io(_)) => "Check that the file exists and is readable.",
            RagError::Extract(_) => "The file could not be parsed. Try a PDF with a text layer or a plain text file.",
            RagError::Embedding(_) => "The embedding model returned unusable vectors. Check llm.embedding_model.",
            RagError::Index(IndexError::InvalidArgument(_)) => "Ask for at least one fragment.",
            _ => "Unexpected failure. Run with RUST_LOG=docent_core=debug for details.",
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

/// Whether a corpus has been ingested yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusState {
    Uninitialized,
    Ready,
}

/// An indexed corpus and where it came from. Never mutated once built.
struct Corpus {
    index: Box<dyn VectorIndex>,
    provenance: Option<Provenance>,
}

/// Ingestion and retrieval over the current corpus.
///
/// `RagEngine` is cheap to clone; clones share the same corpus.
#[derive(Clone)]
pub struct RagEngine {
    chunker: Chunker,
    embedder: Embedder,
    generator: Generator,
    config: RagConfig,
    corpus: Arc<RwLock<Option<Arc<Corpus>>>>,
}

impl RagEngine {
    /// Creates an engine with no corpus.
    ///
    /// # Errors
    ///
    /// Fails with [`RagError::Configuration`] when the chunking parameters
    /// cannot work (zero size or overlap not smaller than size).
    pub fn new(config: &Config, provider: Arc<dyn Provider>) -> Result<Self> {
        let chunker = Chunker::from_config(&config.rag)?;
        let embedder = Embedder::new(
            provider.clone(),
            config.llm.request_timeout(),
            config.rag.embed_concurrency,
        );
        let generator = Generator::new(provider, &config.llm);

        Ok(Self {
            chunker,
            embedder,
            generator,
            config: config.rag.clone(),
            corpus: Arc::new(RwLock::new(None)),
        })
    }

    /// Replaces the corpus with `documents`.
    ///
    /// Every chunk carries `metadata`; `source` and `type` default to
    /// `documents` and `raw` when absent. No provenance is recorded.
    pub async fn ingest_documents<S: AsRef<str>>(
        &self,
        documents: &[S],
        metadata: HashMap<String, String>,
    ) -> Result<IngestReport> {
        let mut metadata = metadata;
        metadata
            .entry(SOURCE_KEY.to_string())
            .or_insert_with(|| DEFAULT_SOURCE.to_string());
        metadata
            .entry(TYPE_KEY.to_string())
            .or_insert_with(|| DocumentKind::Raw.as_str().to_string());

        self.replace_corpus(documents, &metadata, None).await
    }

    /// Replaces the corpus with a single document.
    ///
    /// Text parsed out of a PDF also records [`Provenance`], which answers
    /// report until the next ingestion.
    pub async fn ingest_document(
        &self,
        text: &str,
        source: &str,
        kind: DocumentKind,
        pages: Option<usize>,
    ) -> Result<IngestReport> {
        if text.trim().is_empty() {
            return Err(RagError::EmptyContent);
        }

        let metadata = HashMap::from([
            (SOURCE_KEY.to_string(), source.to_string()),
            (TYPE_KEY.to_string(), kind.as_str().to_string()),
        ]);
        let provenance = (kind == DocumentKind::Pdf).then(|| Provenance::new(source, kind, pages, text));

        self.replace_corpus(&[text], &metadata, provenance).await
    }

    async fn replace_corpus<S: AsRef<str>>(
        &self,
        documents: &[S],
        metadata: &HashMap<String, String>,
        provenance: Option<Provenance>,
    ) -> Result<IngestReport> {
        let chunks = self.chunker.split(documents, metadata);
        if chunks.is_empty() {
            return Err(RagError::EmptyContent);
        }
        debug!(chunks = chunks.len(), "Split documents into chunks");

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let index = BruteForceIndex::build(chunks.into_iter().zip(vectors).collect())?;
        let report = IngestReport {
            documents: documents.len(),
            chunks: index.len(),
            dimension: index.dimension(),
        };

        let corpus = Corpus {
            index: Box::new(index),
            provenance,
        };
        *self.corpus.write().await = Some(Arc::new(corpus));

        info!(
            documents = report.documents,
            chunks = report.chunks,
            dimension = report.dimension,
            "Corpus replaced"
        );
        Ok(report)
    }

    /// Answers `question` from the `k` most similar chunks.
    pub async fn answer(&self, question: &str, k: usize) -> Result<Answer> {
        let corpus = self.snapshot().await?;
        if question.trim().is_empty() {
            return Err(RagError::EmptyContent);
        }

        let query = self.embedder.embed(question).await?;
        let results = corpus.index.search(&query, k)?;
        for (i, result) in results.iter().enumerate() {
            debug!(rank = i + 1, score = result.score, id = result.id, "Retrieved fragment");
        }

        let (context, fragments_used) = prompts::build_context(&results, self.config.context_char_budget);
        let text = self.generator.generate(&prompts::answer(&context, question)).await?;

        info!(fragments = fragments_used, "Answered question");
        Ok(Answer {
            text,
            fragments_used,
            provenance: corpus.provenance.clone(),
        })
    }

    /// Summarizes the whole corpus.
    ///
    /// With [`SummaryStrategy::AllChunks`] every chunk is used; with
    /// [`SummaryStrategy::TopK`] only the `sample_k` chunks closest to a
    /// generic summary probe. Either way chunks are joined in storage order
    /// and cut to the configured character budget.
    pub async fn summarize_whole(&self) -> Result<String> {
        let corpus = self.snapshot().await?;

        let sampled: Vec<String> = match self.config.summary.strategy {
            SummaryStrategy::AllChunks => corpus
                .index
                .chunks()
                .into_iter()
                .map(|chunk| chunk.text.clone())
                .collect(),
            SummaryStrategy::TopK => {
                let probe = self.embedder.embed(SUMMARY_PROBE).await?;
                let mut results = corpus.index.search(&probe, self.config.summary.sample_k)?;
                results.sort_by_key(|r| r.id);
                results.into_iter().map(|r| r.chunk.text).collect()
            }
        };
        debug!(chunks = sampled.len(), strategy = ?self.config.summary.strategy, "Sampled chunks for summary");

        let joined = sampled.join("\n\n");
        let content = prompts::truncate_chars(&joined, self.config.summary.char_budget);
        Ok(self.generator.generate(&prompts::summarize_document(content)).await?)
    }

    /// Summarizes `text` in a few sentences without touching the corpus.
    pub async fn summarize_text(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(RagError::EmptyContent);
        }
        Ok(self.generator.generate(&prompts::summarize_text(text.trim())).await?)
    }

    /// Provenance of the current corpus, if it came from a parsed file.
    pub async fn current_provenance(&self) -> Option<Provenance> {
        self.corpus
            .read()
            .await
            .as_ref()
            .and_then(|corpus| corpus.provenance.clone())
    }

    pub async fn state(&self) -> CorpusState {
        match self.corpus.read().await.as_ref() {
            Some(_) => CorpusState::Ready,
            None => CorpusState::Uninitialized,
        }
    }

    /// Number of chunks in the current corpus.
    pub async fn count(&self) -> usize {
        self.corpus
            .read()
            .await
            .as_ref()
            .map_or(0, |corpus| corpus.index.len())
    }

    /// Clones out the current corpus so the lock is not held across model calls.
    async fn snapshot(&self) -> Result<Arc<Corpus>> {
        self.corpus
            .read()
            .await
            .as_ref()
            .filter(|corpus| !corpus.index.is_empty())
            .cloned()
            .ok_or(RagError::NotInitialized)
    }
}
