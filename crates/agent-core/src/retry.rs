//! Retry Executor
//!
//! Wraps an asynchronous operation (in practice the LLM call) with bounded
//! exponential-backoff retry, governed by a caller-supplied predicate over
//! the failure.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AgentError, Result};

/// Predicate deciding whether a failure is worth retrying
pub type RetryPredicate = Arc<dyn Fn(&AgentError) -> bool + Send + Sync>;

/// Pure retry configuration; one executor is built from one policy and
/// reused across calls.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt (total attempts = 1 + max_retries)
    pub max_retries: usize,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Upper bound on any single backoff delay
    pub max_delay: Duration,

    /// Multiplier applied per attempt
    pub backoff_multiplier: f64,

    /// Retryability predicate
    pub should_retry: RetryPredicate,
}

impl RetryPolicy {
    /// Default policy: retry only transient failures (connection loss,
    /// timeout, rate limiting, provider unavailable).
    pub fn transient() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            should_retry: Arc::new(AgentError::is_retryable),
        }
    }

    /// Fewer, slower retries
    pub fn conservative() -> Self {
        Self {
            max_retries: 1,
            initial_delay: Duration::from_secs(2),
            ..Self::transient()
        }
    }

    /// More, faster retries
    pub fn aggressive() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            ..Self::transient()
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_predicate(
        mut self,
        predicate: impl Fn(&AgentError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_retry = Arc::new(predicate);
        self
    }

    /// Backoff before retry number `attempt` (0-based), capped at `max_delay`
    fn delay_for(&self, attempt: usize) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let delay = self.initial_delay.mul_f64(factor);
        delay.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::transient()
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .finish_non_exhaustive()
    }
}

/// Reusable, stateless-between-calls retry wrapper
#[derive(Clone, Debug, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Construct from a policy; no work starts until `execute`.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run the operation, retrying per the policy. Each call runs
    /// independently of prior calls.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.policy.max_retries || !(self.policy.should_retry)(&err) {
                        return Err(err);
                    }

                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying after failure"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
