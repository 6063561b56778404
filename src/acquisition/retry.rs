//! Bounded retry with exponential backoff

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::FetchError;
use crate::config::RetryConfig;
use crate::types::Feed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(c: &RetryConfig) -> Self {
        Self {
            max_attempts: c.max_attempts.max(1),
            initial_backoff: Duration::from_millis(c.initial_backoff_ms),
            max_backoff: Duration::from_millis(c.max_backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): doubles each time, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Run `attempt` until it succeeds or `max_attempts` is used up.
    ///
    /// Exhaustion yields `None`, which the merger treats as absent data.
    pub async fn run<T, F, Fut>(&self, feed: Feed, mut attempt: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        for n in 1..=self.max_attempts {
            match attempt().await {
                Ok(value) => return Some(value),
                Err(e) if n < self.max_attempts => {
                    let delay = self.backoff(n);
                    warn!(
                        %feed,
                        attempt = n,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(%feed, attempts = n, error = %e, "Fetch failed, skipping tick");
                }
            }
        }
        None
    }
}
