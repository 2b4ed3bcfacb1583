//! Retry with exponential backoff around a provider
//!
//! Only opening a stream is retried. Once a stream has been handed back,
//! fragments may already have reached the client, so mid-stream failures
//! pass straight through.

use std::sync::Arc;
use std::time::Duration;

use agent_core::{
    error::Result,
    message::Message,
    provider::{CompletionStream, GenerationOptions, LlmProvider, ModelInfo},
    tool::ToolSchema,
};
use async_trait::async_trait;

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Backoff before the first retry
    pub initial_backoff: Duration,

    /// Upper bound for any single backoff
    pub max_backoff: Duration,

    /// Backoff multiplier
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn next_backoff(&self, current: Duration) -> Duration {
        Duration::from_secs_f64(current.as_secs_f64() * self.multiplier).min(self.max_backoff)
    }
}

/// Provider wrapper retrying retryable failures when opening a stream
pub struct RetryProvider {
    inner: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn LlmProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LlmProvider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn health_check(&self) -> Result<bool> {
        self.inner.health_check().await
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        let mut backoff = self.policy.initial_backoff;
        let mut attempt = 0;

        loop {
            match self.inner.complete_stream(messages, tools, options).await {
                Ok(stream) => return Ok(stream),
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        provider = self.inner.name(),
                        attempt,
                        max_retries = self.policy.max_retries,
                        error = %e,
                        "Retrying model call after error"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = self.policy.next_backoff(backoff);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.inner.list_models().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::error::AgentError;
    use agent_core::provider::StreamEvent;
    use futures::stream;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        failures: u32,
        retryable: bool,
        calls: AtomicU32,
    }

    #[async_trait]
    impl LlmProvider for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete_stream(
            &self,
            _messages: &[Message],
            _tools: &[ToolSchema],
            _options: &GenerationOptions,
        ) -> Result<CompletionStream> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(if self.retryable {
                    AgentError::ModelUnavailable("503".into())
                } else {
                    AgentError::Model("400".into())
                });
            }
            Ok(Box::pin(stream::iter(vec![Ok(StreamEvent::Delta("ok".into()))])))
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
            multiplier: 1.0,
        }
    }

    fn flaky(failures: u32, retryable: bool) -> Arc<Flaky> {
        Arc::new(Flaky { failures, retryable, calls: AtomicU32::new(0) })
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let inner = flaky(2, true);
        let provider = RetryProvider::new(inner.clone(), fast_policy(2));

        let result = provider
            .complete_stream(&[], &[], &GenerationOptions::default())
            .await;
        assert!(result.is_ok());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let inner = flaky(5, true);
        let provider = RetryProvider::new(inner.clone(), fast_policy(1));

        let result = provider
            .complete_stream(&[], &[], &GenerationOptions::default())
            .await;
        assert!(result.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_permanent_errors() {
        let inner = flaky(1, false);
        let provider = RetryProvider::new(inner.clone(), fast_policy(3));

        let result = provider
            .complete_stream(&[], &[], &GenerationOptions::default())
            .await;
        assert!(result.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::default();
        let next = policy.next_backoff(Duration::from_secs(6));
        assert_eq!(next, policy.max_backoff);
    }
}
