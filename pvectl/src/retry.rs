//! Bounded exponential-backoff retry for calls to the management API.
//!
//! Only errors in the transient allow-list (see [`Error::transient_class`]) are
//! retried. Reads are retried unconditionally; writes only when the policy
//! opts in, since a lifecycle request that timed out may still have been
//! applied on the cluster.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};

/// Whether a request may be safely repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET/HEAD/OPTIONS.
    Read,
    /// Anything that changes cluster state.
    Write,
}

impl Method {
    pub fn from_http(method: &reqwest::Method) -> Self {
        if [
            reqwest::Method::GET,
            reqwest::Method::HEAD,
            reqwest::Method::OPTIONS,
        ]
        .contains(method)
        {
            Method::Read
        } else {
            Method::Write
        }
    }
}

/// Retry configuration, built once per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    retry_writes: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            retry_writes: false,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            retry_writes: false,
        }
    }

    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_retry_writes(mut self, retry_writes: bool) -> Self {
        self.retry_writes = retry_writes;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_writes(&self) -> bool {
        self.retry_writes
    }

    /// Backoff before retry number `attempt` (1-based):
    /// `min(base_delay * 2^(attempt-1), max_delay)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        2u32.checked_pow(exponent)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Whether `error` may be retried for `method` at all.
    pub fn is_retryable(&self, method: Method, error: &Error) -> bool {
        error.transient_class().is_some() && (method == Method::Read || self.retry_writes)
    }

    /// Run `operation`, retrying transient failures with backoff.
    ///
    /// After `max_retries` retries the last error is returned unchanged.
    pub async fn with_retry<F, Fut, T>(&self, method: Method, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let Some(class) = error.transient_class() else {
                return Err(error);
            };
            if !self.is_retryable(method, &error) {
                return Err(error);
            }

            attempt += 1;
            if attempt > self.max_retries {
                return Err(error);
            }

            let delay = self.delay(attempt);
            // Never log the error itself: messages may carry URLs with credentials.
            warn!(
                error_class = class,
                attempt,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                "Transient API failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
