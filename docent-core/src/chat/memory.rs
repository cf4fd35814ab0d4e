//! Conversational memory for the chat path.
//!
//! Memory is a convenience, not a dependency: a read that fails or stalls
//! yields an empty history, and appends run on a detached task whose failures
//! only show up in logs and in [`ConversationMemory::failed_appends`].

use crate::config::MemoryConfig;
use crate::deadline::call_with_deadline;
use crate::rag::prompts::truncate_chars;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Memory store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, MemoryError>;

/// One exchange: what the user said and what the assistant replied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub input: String,
    pub output: String,
}

impl ConversationTurn {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Backing storage for conversation turns, oldest first.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn load(&self) -> Result<Vec<ConversationTurn>>;

    async fn append(&self, turn: ConversationTurn) -> Result<()>;

    fn clear(&self);
}

/// Process-local store keeping the most recent `capacity` turns.
pub struct InMemoryStore {
    turns: RwLock<VecDeque<ConversationTurn>>,
    capacity: usize,
}

impl InMemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn load(&self) -> Result<Vec<ConversationTurn>> {
        let turns = self.turns.read().unwrap_or_else(|e| e.into_inner());
        Ok(turns.iter().cloned().collect())
    }

    async fn append(&self, turn: ConversationTurn) -> Result<()> {
        let mut turns = self.turns.write().unwrap_or_else(|e| e.into_inner());
        turns.push_back(turn);
        while turns.len() > self.capacity {
            turns.pop_front();
        }
        Ok(())
    }

    fn clear(&self) {
        self.turns.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// Timeout-guarded, best-effort view over a [`MemoryStore`].
#[derive(Clone)]
pub struct ConversationMemory {
    store: Arc<dyn MemoryStore>,
    window_turns: usize,
    turn_char_limit: usize,
    read_timeout: Duration,
    failed_appends: Arc<AtomicUsize>,
}

impl ConversationMemory {
    pub fn new(store: Arc<dyn MemoryStore>, config: &MemoryConfig) -> Self {
        Self {
            store,
            window_turns: config.window_turns,
            turn_char_limit: config.turn_char_limit,
            read_timeout: config.read_timeout(),
            failed_appends: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Memory backed by an [`InMemoryStore`].
    pub fn in_memory(config: &MemoryConfig) -> Self {
        Self::new(Arc::new(InMemoryStore::new(config.capacity)), config)
    }

    /// All stored turns, or none when the store fails or misses the deadline.
    pub async fn read(&self) -> Vec<ConversationTurn> {
        match call_with_deadline("memory read", self.read_timeout, self.store.load()).await {
            Ok(Ok(turns)) => turns,
            Ok(Err(e)) => {
                warn!(error = %e, "Memory read failed, continuing without history");
                Vec::new()
            }
            // already logged by the deadline wrapper
            Err(_) => Vec::new(),
        }
    }

    /// The last few turns, each side truncated, ready for a prompt.
    pub async fn window(&self) -> Vec<(String, String)> {
        let turns = self.read().await;
        let skip = turns.len().saturating_sub(self.window_turns);

        turns
            .iter()
            .skip(skip)
            .map(|turn| {
                (
                    truncate_chars(&turn.input, self.turn_char_limit).to_string(),
                    truncate_chars(&turn.output, self.turn_char_limit).to_string(),
                )
            })
            .collect()
    }

    /// Stores a turn on a detached task and returns immediately.
    ///
    /// The handle may be dropped; it exists so callers that care can wait.
    pub fn append(&self, turn: ConversationTurn) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let failed_appends = Arc::clone(&self.failed_appends);

        tokio::spawn(async move {
            match store.append(turn).await {
                Ok(()) => debug!("Conversation turn stored"),
                Err(e) => {
                    let failures = failed_appends.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(error = %e, failures, "Failed to store conversation turn");
                }
            }
        })
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    /// Number of appends that failed since this memory was created.
    pub fn failed_appends(&self) -> usize {
        self.failed_appends.load(Ordering::Relaxed)
    }
}
