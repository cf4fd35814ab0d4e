//! The document assistant façade.
//!
//! `ChatManager` composes the retrieval engine, the generation backend and
//! conversational memory into the operations a front end needs: load a
//! document, ask about it, summarize it, and chat.
//!
//! # Chat flow
//!
//! ```text
//! memory.window() ──► prompt ──► generate (raced against chat deadline)
//!                                   │
//!                                   ├─ Ok  ──► spawn memory.append ──► reply
//!                                   └─ Err ──► classified RagError
//! ```
//!
//! Memory never blocks or fails a chat turn: a slow or broken store only
//! costs the turn its history.

use super::memory::{ConversationMemory, ConversationTurn, MemoryStore};
use crate::config::Config;
use crate::deadline::call_with_deadline;
use crate::extract::{self, DocumentKind};
use crate::provider::{Generator, OllamaProvider, Provider, ProviderError};
use crate::rag::{prompts, Answer, IngestReport, Provenance, RagEngine, RagError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Document question answering and chat over one shared corpus.
///
/// # Examples
///
/// ```no_run
/// use docent_core::{ChatManager, Config};
///
/// # async fn example() -> Result<(), docent_core::RagError> {
/// let manager = ChatManager::new(Config::load_or_default()?)?;
/// manager.ingest_file("report.pdf".as_ref()).await?;
///
/// let answer = manager.answer("What are the conclusions?").await?;
/// println!("{}", answer.text);
/// # Ok(())
/// # }
/// ```
///
/// One manager is meant to be shared (behind an `Arc`) by every request of a
/// session; ingestion and queries may run concurrently.
pub struct ChatManager {
    config: Config,
    rag: RagEngine,
    generator: Generator,
    memory: ConversationMemory,
}

impl ChatManager {
    /// Creates a manager talking to the Ollama server from `config`.
    ///
    /// # Errors
    ///
    /// Fails with [`RagError::Configuration`] when the configuration is
    /// invalid.
    pub fn new(config: Config) -> Result<Self> {
        let provider = OllamaProvider::new(&config.llm)?;
        Self::with_provider(config, Arc::new(provider))
    }

    /// Creates a manager on top of any [`Provider`].
    ///
    /// The configuration is validated here, so every constructor fails fast.
    pub fn with_provider(config: Config, provider: Arc<dyn Provider>) -> Result<Self> {
        config.validate()?;
        let rag = RagEngine::new(&config, provider.clone())?;
        let generator = Generator::new(provider, &config.llm);
        let memory = ConversationMemory::in_memory(&config.memory);

        Ok(Self {
            config,
            rag,
            generator,
            memory,
        })
    }

    /// Replaces the memory backend.
    pub fn with_memory_store(mut self, store: Arc<dyn MemoryStore>) -> Self {
        self.memory = ConversationMemory::new(store, &self.config.memory);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Reads a PDF or text file and makes it the current corpus.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport> {
        let extracted = extract::extract_file(path).await?;
        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        info!(
            source = %source,
            kind = extracted.kind.as_str(),
            pages = ?extracted.pages,
            "Extracted document"
        );
        self.rag
            .ingest_document(&extracted.text, &source, extracted.kind, extracted.pages)
            .await
    }

    pub async fn ingest_document(
        &self,
        text: &str,
        source: &str,
        kind: DocumentKind,
        pages: Option<usize>,
    ) -> Result<IngestReport> {
        self.rag.ingest_document(text, source, kind, pages).await
    }

    pub async fn ingest_documents<S: AsRef<str>>(
        &self,
        documents: &[S],
        metadata: HashMap<String, String>,
    ) -> Result<IngestReport> {
        self.rag.ingest_documents(documents, metadata).await
    }

    /// Answers from the configured number of fragments.
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        self.rag.answer(question, self.config.rag.top_k).await
    }

    pub async fn answer_with_k(&self, question: &str, k: usize) -> Result<Answer> {
        self.rag.answer(question, k).await
    }

    pub async fn summarize_whole(&self) -> Result<String> {
        self.rag.summarize_whole().await
    }

    pub async fn summarize_text(&self, text: &str) -> Result<String> {
        self.rag.summarize_text(text).await
    }

    /// One conversational turn.
    ///
    /// The reply is returned as soon as it is generated; storing the turn
    /// happens in the background. A reply slower than `chat.timeout_secs` is
    /// reported as a timeout and discarded.
    pub async fn chat(&self, message: &str) -> Result<String> {
        if message.trim().is_empty() {
            return Err(RagError::EmptyContent);
        }

        let history = self.memory.window().await;
        debug!(turns = history.len(), "Building chat prompt");
        let prompt = prompts::chat(&self.config.chat.system_prompt, &history, message);

        let reply = call_with_deadline("chat", self.config.chat.timeout(), self.generator.generate(&prompt))
            .await
            .unwrap_or(Err(ProviderError::Timeout))?;

        // detached; failures are counted by the memory
        self.memory.append(ConversationTurn::new(message, reply.clone()));
        Ok(reply)
    }

    /// Full stored history, or empty when memory is unavailable.
    pub async fn read_memory(&self) -> Vec<ConversationTurn> {
        self.memory.read().await
    }

    pub fn clear_memory(&self) {
        self.memory.clear();
        info!("Conversation memory cleared");
    }

    pub async fn current_provenance(&self) -> Option<Provenance> {
        self.rag.current_provenance().await
    }

    /// Number of chunks in the current corpus.
    pub async fn chunk_count(&self) -> usize {
        self.rag.count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::memory::MemoryError;
    use crate::config::{ChatConfig, RagConfig};
    use crate::provider::FailureKind;
    use crate::testing::FakeProvider;
    use async_trait::async_trait;
    use std::time::Duration;

    struct StalledStore;

    #[async_trait]
    impl MemoryStore for StalledStore {
        async fn load(&self) -> crate::chat::memory::Result<Vec<ConversationTurn>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }

        async fn append(&self, _turn: ConversationTurn) -> crate::chat::memory::Result<()> {
            Err(MemoryError::Unavailable("stalled".into()))
        }

        fn clear(&self) {}
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.memory.read_timeout_ms = 50;
        config.chat = ChatConfig {
            timeout_secs: 1,
            ..ChatConfig::default()
        };
        config.rag = RagConfig {
            chunk_size: 80,
            chunk_overlap: 10,
            ..RagConfig::default()
        };
        config
    }

    fn manager(provider: Arc<FakeProvider>) -> ChatManager {
        ChatManager::with_provider(config(), provider).unwrap()
    }

    async fn wait_for_history(manager: &ChatManager, turns: usize) {
        for _ in 0..100 {
            if manager.read_memory().await.len() >= turns {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_chat_records_turn() {
        let provider = Arc::new(FakeProvider::new());
        provider.set_reply("Hello there");
        let manager = manager(provider);

        assert_eq!(manager.chat("hi").await.unwrap(), "Hello there");
        wait_for_history(&manager, 1).await;
        assert_eq!(manager.read_memory().await, vec![ConversationTurn::new("hi", "Hello there")]);

        manager.clear_memory();
        assert!(manager.read_memory().await.is_empty());
    }

    #[tokio::test]
    async fn test_chat_prompt_holds_last_three_turns() {
        let provider = Arc::new(FakeProvider::new());
        let manager = manager(provider.clone());
        for i in 0..8 {
            let input = format!("question {i} {}", "q".repeat(250));
            manager.memory().append(ConversationTurn::new(input, format!("reply {i}"))).await.unwrap();
        }

        manager.chat("next").await.unwrap();
        let prompt = provider.last_prompt().unwrap();
        assert!(!prompt.contains("question 4"));
        assert!(prompt.contains("question 5"));
        assert!(prompt.contains("reply 7"));
        // each input is cut to 200 characters
        assert!(!prompt.contains(&"q".repeat(200)));
        assert!(prompt.contains(&"q".repeat(189)));
    }

    #[tokio::test]
    async fn test_chat_survives_memory_outage() {
        let provider = Arc::new(FakeProvider::new());
        provider.set_reply("still here");
        let manager = manager(provider).with_memory_store(Arc::new(StalledStore));

        assert_eq!(manager.chat("are you there?").await.unwrap(), "still here");
        for _ in 0..100 {
            if manager.memory().failed_appends() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(manager.memory().failed_appends(), 1);
    }

    #[tokio::test]
    async fn test_slow_chat_reports_timeout() {
        let provider = Arc::new(FakeProvider::new());
        provider.set_generate_delay(Duration::from_secs(5));
        let manager = manager(provider);

        let err = manager.chat("hello").await.unwrap_err();
        assert_eq!(err.failure_kind(), Some(FailureKind::Timeout));
        assert!(manager.read_memory().await.is_empty());
    }

    #[tokio::test]
    async fn test_generation_failures_are_classified() {
        let provider = Arc::new(FakeProvider::new());
        provider.fail_generation_times(1, || ProviderError::InvalidCredential);
        let manager = manager(provider);

        let err = manager.chat("hello").await.unwrap_err();
        assert_eq!(err.failure_kind(), Some(FailureKind::InvalidCredential));
        assert!(err.hint().contains("credentials"));
    }

    #[tokio::test]
    async fn test_ingest_file_then_answer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "The meeting is on Tuesday.\n\nBring the quarterly report.").unwrap();

        let provider = Arc::new(FakeProvider::new());
        let manager = manager(provider.clone());
        let report = manager.ingest_file(&path).await.unwrap();
        assert_eq!(report.documents, 1);
        assert_eq!(manager.chunk_count().await, report.chunks);

        let answer = manager.answer("When is the meeting?").await.unwrap();
        assert!(answer.fragments_used >= 1);
        assert!(answer.provenance.is_none());
        assert!(provider.last_prompt().unwrap().contains("Tuesday"));
    }

    #[tokio::test]
    async fn test_blank_file_keeps_previous_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let blank = dir.path().join("blank.txt");
        std::fs::write(&blank, "  \n \n").unwrap();

        let manager = manager(Arc::new(FakeProvider::new()));
        manager
            .ingest_document("Cats sleep most of the day.", "cats.txt", DocumentKind::Raw, None)
            .await
            .unwrap();

        let err = manager.ingest_file(&blank).await.unwrap_err();
        assert!(matches!(err, RagError::EmptyContent));
        assert!(manager.answer("cats").await.is_ok());
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let mut config = config();
        config.memory.window_turns = 0;
        let result = ChatManager::with_provider(config.clone(), Arc::new(FakeProvider::new()));
        assert!(matches!(result, Err(RagError::Configuration(_))));

        let result = ChatManager::new(config);
        assert!(matches!(result, Err(RagError::Configuration(_))));
    }
}
