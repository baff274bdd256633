//! Bounded retries for transient marketplace failures.

use std::future::Future;
use std::time::Duration;

use rand::random;
use tokio::time::sleep;
use tracing::debug;

use crate::error::MarketplaceError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn delay_for(&self, attempt: usize, err: &MarketplaceError) -> Option<Duration> {
        let max_ms = self.max_delay.as_millis() as u64;
        if let MarketplaceError::RateLimited {
            retry_after: Some(after),
        } = err
        {
            // Waiting longer than the cap is the caller's decision.
            return (*after <= self.max_delay).then_some(*after);
        }

        let base_ms = self.base_delay.as_millis() as u64;
        let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(16));
        let capped_ms = exp_ms.min(max_ms);
        let jitter_ms = random::<u64>() % (capped_ms / 4 + 1);
        Some(Duration::from_millis((capped_ms + jitter_ms).min(max_ms)))
    }
}

/// Runs `op` until it succeeds, fails permanently, or the retry budget is spent.
pub async fn with_retry<T, F, Fut>(
    op_name: &'static str,
    policy: RetryPolicy,
    op: F,
) -> Result<T, MarketplaceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MarketplaceError>>,
{
    retry_when(op_name, policy, MarketplaceError::is_transient, op).await
}

/// Like [`with_retry`], but only repeats requests the platform never received.
///
/// For creates: a timeout or 5xx may hide a request that was processed, and
/// sending it again would publish a second listing.
pub async fn with_retry_unsent<T, F, Fut>(
    op_name: &'static str,
    policy: RetryPolicy,
    op: F,
) -> Result<T, MarketplaceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MarketplaceError>>,
{
    retry_when(op_name, policy, MarketplaceError::is_unsent, op).await
}

async fn retry_when<T, F, Fut>(
    op_name: &'static str,
    policy: RetryPolicy,
    retryable: fn(&MarketplaceError) -> bool,
    mut op: F,
) -> Result<T, MarketplaceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MarketplaceError>>,
{
    let mut attempt = 0usize;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !retryable(&err) || attempt >= policy.max_retries {
                    return Err(err);
                }
                let Some(delay) = policy.delay_for(attempt, &err) else {
                    return Err(err);
                };

                debug!(
                    "{} failed transiently ({}), retrying in {:?} (attempt {}/{})",
                    op_name,
                    err,
                    delay,
                    attempt + 1,
                    policy.max_retries
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
