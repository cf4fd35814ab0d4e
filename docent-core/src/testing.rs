//! Deterministic in-process provider for unit tests.

use crate::provider::{Provider, ProviderError, Result};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type ErrorFactory = Box<dyn Fn() -> ProviderError + Send + Sync>;

/// Bag-of-words embeddings and echoing generation.
///
/// Texts sharing words land close together, which is all retrieval tests need.
pub(crate) struct FakeProvider {
    dimension: usize,
    generate_calls: AtomicUsize,
    embed_calls: AtomicUsize,
    fail_embeddings: AtomicBool,
    generation_failures: Mutex<(usize, Option<ErrorFactory>)>,
    generate_delay: Mutex<Duration>,
    slow_embeddings: Mutex<Option<(String, Duration)>>,
    nan_marker: Mutex<Option<String>>,
    reply: Mutex<Option<String>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub(crate) fn new() -> Self {
        Self::with_dimension(64)
    }

    pub(crate) fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            generate_calls: AtomicUsize::new(0),
            embed_calls: AtomicUsize::new(0),
            fail_embeddings: AtomicBool::new(false),
            generation_failures: Mutex::new((0, None)),
            generate_delay: Mutex::new(Duration::ZERO),
            slow_embeddings: Mutex::new(None),
            nan_marker: Mutex::new(None),
            reply: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fail_generation_times<F>(&self, times: usize, error: F)
    where
        F: Fn() -> ProviderError + Send + Sync + 'static,
    {
        *self.generation_failures.lock().unwrap() = (times, Some(Box::new(error)));
    }

    pub(crate) fn set_fail_embeddings(&self, fail: bool) {
        self.fail_embeddings.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_generate_delay(&self, delay: Duration) {
        *self.generate_delay.lock().unwrap() = delay;
    }

    /// Delays embedding of every text containing `marker`.
    pub(crate) fn set_embed_delay_for(&self, marker: impl Into<String>, delay: Duration) {
        *self.slow_embeddings.lock().unwrap() = Some((marker.into(), delay));
    }

    /// Embeds every text containing `marker` as a vector of NaNs.
    pub(crate) fn set_nan_embeddings_for(&self, marker: impl Into<String>) {
        *self.nan_marker.lock().unwrap() = Some(marker.into());
    }

    pub(crate) fn set_reply(&self, reply: impl Into<String>) {
        *self.reply.lock().unwrap() = Some(reply.into());
    }

    pub(crate) fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }

    fn bag_of_words(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Provider for FakeProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        let delay = *self.generate_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        {
            let mut failures = self.generation_failures.lock().unwrap();
            if failures.0 > 0 {
                failures.0 -= 1;
                if let Some(make) = &failures.1 {
                    return Err(make());
                }
            }
        }

        match self.reply.lock().unwrap().clone() {
            Some(reply) => Ok(reply),
            None => Ok(format!("echo: {prompt}")),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embeddings.load(Ordering::SeqCst) {
            return Err(ProviderError::Unreachable("embedding backend offline".into()));
        }

        let delay = self
            .slow_embeddings
            .lock()
            .unwrap()
            .as_ref()
            .filter(|(marker, _)| text.contains(marker.as_str()))
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let poisoned = self
            .nan_marker
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|marker| text.contains(marker.as_str()));
        if poisoned {
            return Ok(vec![f32::NAN; self.dimension]);
        }
        Ok(self.bag_of_words(text))
    }
}
