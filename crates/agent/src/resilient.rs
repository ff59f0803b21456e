use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::completion::{Completion, CompletionClient, CompletionError, CompletionRequest};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_millis(5_000),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let multiplier = 1_u32 << attempt.min(16);
        self.base_delay.saturating_mul(multiplier).min(self.max_delay)
    }
}

/// Adds a per-attempt timeout, bounded retries with exponential backoff and
/// cooperative cancellation to any completion client.
pub struct ResilientClient<C> {
    inner: C,
    timeout: Duration,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl<C> ResilientClient<C>
where
    C: CompletionClient,
{
    pub fn new(inner: C, timeout: Duration, policy: RetryPolicy) -> Self {
        Self { inner, timeout, policy, cancel: CancellationToken::new() }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn attempt(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(CompletionError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, self.inner.complete(request)) => {
                outcome.unwrap_or(Err(CompletionError::Timeout { secs: self.timeout.as_secs() }))
            }
        }
    }
}

#[async_trait]
impl<C> CompletionClient for ResilientClient<C>
where
    C: CompletionClient,
{
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        let mut attempt = 0;
        loop {
            let error = match self.attempt(request).await {
                Ok(completion) => return Ok(completion),
                Err(error) => error,
            };

            if !error.is_retryable() {
                return Err(error);
            }
            if attempt >= self.policy.max_retries {
                return Err(CompletionError::Exhausted {
                    attempts: attempt + 1,
                    last: Box::new(error),
                });
            }

            let delay = self.policy.backoff(attempt);
            warn!(
                event_name = "completion.retry",
                provider = self.inner.provider(),
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "completion call failed, retrying"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(CompletionError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    fn provider(&self) -> &str {
        self.inner.provider()
    }

    fn is_configured(&self) -> bool {
        self.inner.is_configured()
    }
}
