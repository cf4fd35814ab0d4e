//! docent - Ask questions about a document
//!
//! This is the convenience wrapper crate that re-exports docent components.
//!
//! # Quick Start
//!
//! ```no_run
//! use docent::prelude::*;
//!
//! # async fn example() -> Result<(), RagError> {
//! let manager = ChatManager::new(Config::load_or_default()?)?;
//! manager.ingest_file("paper.pdf".as_ref()).await?;
//! println!("{}", manager.summarize_whole().await?);
//! # Ok(())
//! # }
//! ```

// Re-export core
pub use docent_core::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use async_trait::async_trait;
    pub use docent_core::chat::{InMemoryStore, MemoryError};
    pub use docent_core::*;
}
