use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the whole assistant.
///
/// Every section falls back to its defaults, so a config file only needs to
/// list the values it overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub rag: RagConfig,
    pub chat: ChatConfig,
    pub memory: MemoryConfig,
}

/// Configuration for the language model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub temperature: f64,
    /// Bearer token sent with every request, if the backend sits behind a gateway
    pub api_key: Option<String>,
    /// Deadline applied to every single generation or embedding call
    pub request_timeout_secs: u64,
    /// How many times a rate-limited call is retried before giving up
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

/// Configuration for chunking, retrieval and summarization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
    /// Number of fragments retrieved for a question
    pub top_k: usize,
    /// Upper bound on the context block handed to the model when answering
    pub context_char_budget: usize,
    /// Maximum number of embedding calls in flight during ingestion
    pub embed_concurrency: usize,
    pub summary: SummaryConfig,
}

/// How whole-document summaries pick their source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStrategy {
    /// Every chunk in document order, cut at the character budget
    AllChunks,
    /// The `sample_k` chunks closest to a generic summary probe, put back in document order
    TopK,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub strategy: SummaryStrategy,
    pub sample_k: usize,
    pub char_budget: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub system_prompt: String,
    /// Deadline for a whole chat turn; a slower reply is reported as a timeout
    pub timeout_secs: u64,
}

/// Configuration for the conversational memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Turns included in a chat prompt (each turn is two messages)
    pub window_turns: usize,
    /// Characters kept from each side of a turn inside the prompt
    pub turn_char_limit: usize,
    pub read_timeout_ms: u64,
    /// Turns retained by the store before the oldest are dropped
    pub capacity: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            temperature: 0.3,
            api_key: None,
            request_timeout_secs: 60,
            max_retries: 1,
            retry_backoff_ms: 1000,
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 3,
            context_char_budget: 6000,
            embed_concurrency: 4,
            summary: SummaryConfig::default(),
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            strategy: SummaryStrategy::AllChunks,
            sample_k: 10,
            char_budget: 8000,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a friendly, concise assistant. Answer in plain language."
                .to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            window_turns: 3,
            turn_char_limit: 200,
            read_timeout_ms: 2000,
            capacity: 50,
        }
    }
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl ChatConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl MemoryConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `config.yaml` if it exists, otherwise use defaults.
    pub fn load_or_default() -> Result<Self> {
        Self::load_or_default_from("config.yaml")
    }

    /// Load configuration from `path`, using defaults only when the file is absent.
    ///
    /// A file that exists but cannot be read, parsed or validated is an error.
    pub fn load_or_default_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        match Self::load(path) {
            Err(ConfigError::FileRead(e)) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            other => other,
        }
    }

    /// Rejects settings that would make chunking or retrieval misbehave.
    pub fn validate(&self) -> Result<()> {
        let rag = &self.rag;
        if rag.chunk_size == 0 {
            return Err(ConfigError::Invalid("rag.chunk_size must be positive".into()));
        }
        if rag.chunk_overlap >= rag.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                rag.chunk_overlap, rag.chunk_size
            )));
        }
        if rag.top_k == 0 || rag.summary.sample_k == 0 {
            return Err(ConfigError::Invalid("rag.top_k and rag.summary.sample_k must be positive".into()));
        }
        if rag.embed_concurrency == 0 {
            return Err(ConfigError::Invalid("rag.embed_concurrency must be positive".into()));
        }
        if self.memory.window_turns == 0 || self.memory.capacity < self.memory.window_turns {
            return Err(ConfigError::Invalid(
                "memory.window_turns must be positive and no larger than memory.capacity".into(),
            ));
        }
        if self.llm.request_timeout_secs == 0
            || self.chat.timeout_secs == 0
            || self.memory.read_timeout_ms == 0
        {
            return Err(ConfigError::Invalid("timeouts must be positive".into()));
        }
        Ok(())
    }
}
