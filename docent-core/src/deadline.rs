//! Deadline wrapper for calls that leave the process.
//!
//! Embedding, generation and memory reads all go through
//! [`call_with_deadline`]. When the deadline passes first the pending future
//! is dropped, so a late result is never observed by the caller.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// The wrapped call did not finish in time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{label} did not complete within {after:?}")]
pub struct DeadlineExceeded {
    pub label: &'static str,
    pub after: Duration,
}

/// Races `call` against `deadline`.
pub async fn call_with_deadline<F, T>(
    label: &'static str,
    deadline: Duration,
    call: F,
) -> Result<T, DeadlineExceeded>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(value) => Ok(value),
        Err(_) => {
            warn!(call = label, ?deadline, "Deadline exceeded, discarding pending call");
            Err(DeadlineExceeded { label, after: deadline })
        }
    }
}
