//! Chat session management: the assistant façade and conversational memory.

mod manager;
pub mod memory;

pub use manager::ChatManager;
pub use memory::{ConversationMemory, ConversationTurn, InMemoryStore, MemoryError, MemoryStore};
