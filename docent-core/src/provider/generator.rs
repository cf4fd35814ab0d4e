//! Deadline-guarded generation with a small bounded retry on rate limits.

use super::types::{FailureKind, Provider, ProviderError, Result};
use crate::config::LlmConfig;
use crate::deadline::call_with_deadline;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on a server-suggested wait before a retry.
const MAX_RETRY_WAIT: Duration = Duration::from_secs(10);

/// Wraps a [`Provider`] so every generation call is bounded in time.
///
/// Rate-limited calls are retried at most `max_retries` times; every other
/// failure is returned on the first occurrence.
#[derive(Clone)]
pub struct Generator {
    provider: Arc<dyn Provider>,
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl Generator {
    pub fn new(provider: Arc<dyn Provider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            timeout: config.request_timeout(),
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
        }
    }

    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            debug!(attempt, prompt_chars = prompt.len(), "Calling generation backend");
            let outcome = call_with_deadline("generate", self.timeout, self.provider.generate(prompt))
                .await
                .unwrap_or(Err(ProviderError::Timeout));

            match outcome {
                Err(ProviderError::RateLimited { retry_after }) if attempt < self.max_retries => {
                    attempt += 1;
                    let wait = retry_after.unwrap_or(self.backoff).min(MAX_RETRY_WAIT);
                    warn!(attempt, ?wait, "Generation rate limited, retrying");
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    if e.kind() == FailureKind::RateLimited {
                        warn!(attempts = attempt + 1, "Generation still rate limited, giving up");
                    }
                    return Err(e);
                }
                Ok(text) => return Ok(text),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProvider;

    fn config(max_retries: u32) -> LlmConfig {
        LlmConfig {
            max_retries,
            retry_backoff_ms: 1,
            request_timeout_secs: 1,
            ..LlmConfig::default()
        }
    }

    #[tokio::test]
    async fn test_retries_rate_limit_once() {
        let provider = Arc::new(FakeProvider::new());
        provider.fail_generation_times(1, || ProviderError::RateLimited { retry_after: None });
        let generator = Generator::new(provider.clone(), &config(1));

        let text = generator.generate("hello").await.unwrap();
        assert!(text.contains("hello"));
        assert_eq!(provider.generate_calls(), 2);
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let provider = Arc::new(FakeProvider::new());
        provider.fail_generation_times(5, || ProviderError::RateLimited { retry_after: None });
        let generator = Generator::new(provider.clone(), &config(1));

        let err = generator.generate("hello").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::RateLimited);
        assert_eq!(provider.generate_calls(), 2);
    }

    #[tokio::test]
    async fn test_credentials_are_not_retried() {
        let provider = Arc::new(FakeProvider::new());
        provider.fail_generation_times(1, || ProviderError::InvalidCredential);
        let generator = Generator::new(provider.clone(), &config(3));

        let err = generator.generate("hello").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidCredential);
        assert_eq!(provider.generate_calls(), 1);
    }

    #[tokio::test]
    async fn test_hung_backend_times_out() {
        let provider = Arc::new(FakeProvider::new());
        provider.set_generate_delay(Duration::from_secs(30));
        let generator = Generator::new(provider, &config(0));

        let err = generator.generate("hello").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Timeout);
    }
}
