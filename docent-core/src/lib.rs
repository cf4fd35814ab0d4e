//! docent-core - Retrieval augmented question answering over a document
//!
//! Provides the components for asking questions about a single document:
//! - Text extraction (PDF and plain text)
//! - Recursive chunking and a pluggable vector index
//! - LLM provider abstraction (Ollama)
//! - Answering, summarization and chat with conversational memory
//! - Configuration management
//!
//! ## Primary API
//!
//! Front ends should go through [`ChatManager`].

// Public modules
pub mod chat;
pub mod config;
pub mod deadline;
pub mod extract;
pub mod provider;
pub mod rag;

#[cfg(test)]
mod testing;

// Public exports
pub use chat::{ChatManager, ConversationMemory, ConversationTurn, MemoryStore};
pub use config::{Config, ConfigError};
pub use deadline::{call_with_deadline, DeadlineExceeded};
pub use extract::{DocumentKind, ExtractError, ExtractedText, TextExtractor};
pub use rag::{Answer, Chunk, CorpusState, IngestReport, Provenance, RagEngine, RagError};

// Provider exports
pub use provider::{FailureKind, Generator, OllamaProvider, Provider, ProviderError};
