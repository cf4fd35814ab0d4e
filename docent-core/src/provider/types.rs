//! Common types for LLM providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when interacting with a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Rate limited by the model backend")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Model backend timed out")]
    Timeout,

    #[error("Model backend rejected the credentials")]
    InvalidCredential,

    #[error("Model backend unreachable: {0}")]
    Unreachable(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Model backend returned an empty response")]
    EmptyResponse,
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Coarse classification of a provider failure.
///
/// Callers branch on this instead of matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited,
    Timeout,
    InvalidCredential,
    Unreachable,
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::RateLimited => "rate limited",
            FailureKind::Timeout => "timeout",
            FailureKind::InvalidCredential => "invalid credential",
            FailureKind::Unreachable => "unreachable",
            FailureKind::Other => "backend error",
        };
        f.write_str(name)
    }
}

impl ProviderError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProviderError::RateLimited { .. } => FailureKind::RateLimited,
            ProviderError::Timeout => FailureKind::Timeout,
            ProviderError::InvalidCredential => FailureKind::InvalidCredential,
            ProviderError::Unreachable(_) => FailureKind::Unreachable,
            ProviderError::Request(e) if e.is_timeout() => FailureKind::Timeout,
            ProviderError::Request(e) if e.is_connect() => FailureKind::Unreachable,
            _ => FailureKind::Other,
        }
    }

    /// Maps an HTTP status to the failure it stands for.
    pub fn from_status(status: u16, retry_after: Option<Duration>, message: String) -> Self {
        match status {
            429 => ProviderError::RateLimited { retry_after },
            401 | 403 => ProviderError::InvalidCredential,
            408 | 504 => ProviderError::Timeout,
            502 | 503 => ProviderError::Unreachable(message),
            _ => ProviderError::Api { status, message },
        }
    }
}

/// Provider trait for LLM backends.
///
/// Both calls are opaque to the rest of the crate: a prompt goes in and a
/// completion comes out, a text goes in and a fixed-length vector comes out.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate a completion for a single prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate an embedding vector for the given text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Request for generating embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub model: String,
    pub input: String,
}

/// Response containing embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub embeddings: Vec<Vec<f32>>,
}
