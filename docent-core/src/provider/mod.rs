//! LLM provider abstraction layer.
//!
//! This module defines a common interface for model backends to provide
//! completions and embeddings, plus the [`Generator`] wrapper the rest of the
//! crate calls through.

mod generator;
mod types;
pub mod ollama;

// Re-export common types
pub use types::{
    Provider,
    ProviderError,
    FailureKind,
    Result,
    EmbedRequest,
    EmbedResponse,
};

pub use generator::Generator;

// Re-export provider implementations
pub use ollama::OllamaProvider;
