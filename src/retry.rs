//! Single automatic retry for transient gateway failures.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::fetcher::FetchError;
use crate::gateway::GatewayError;
use crate::moderation::ModerationError;

/// Errors that may clear up when the same call is repeated.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for GatewayError {
    fn is_retryable(&self) -> bool {
        GatewayError::is_retryable(self)
    }
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        self.gateway_error().is_retryable()
    }
}

impl Retryable for ModerationError {
    fn is_retryable(&self) -> bool {
        self.gateway_error().is_some_and(GatewayError::is_retryable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// At most one retry is ever made.
    max_retries: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries: max_retries.min(1),
            backoff,
        }
    }

    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Runs `op`, repeating it after the backoff if it fails with a
    /// network-class error and retries are left.
    pub async fn run<T, E, F, Fut>(&self, name: &str, mut op: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(err) if attempt < self.max_retries && err.is_retryable() => {
                    attempt += 1;
                    tracing::warn!(
                        operation = name,
                        attempt,
                        error = %err,
                        backoff_ms = self.backoff.as_millis() as u64,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, Duration::from_millis(config.backoff_ms))
    }
}
