//! Bounded retries with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// How many times to retry and how long to wait between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = single attempt).
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every further retry.
    pub base_delay: Duration,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay to wait before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's retries are used up. The last error is returned.
pub async fn with_retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_retries && retryable(&e) => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                warn!(
                    "{} failed: {} (retry {}/{} in {:?})",
                    what, e, attempt, policy.max_retries, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                debug!("{} giving up after {} retries", what, attempt);
                return Err(e);
            }
        }
    }
}
