//! Exponential-backoff retry for unreliable collaborator calls

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Maximum share of the computed delay added as random jitter
const JITTER_FACTOR: f64 = 0.3;

/// Classifies an error as worth retrying or fatal
pub trait RetryClass {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Backoff for the given zero-based attempt:
    /// `min(initial_delay * 2^attempt, max_delay)` plus up to 30% jitter.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let initial_ms = self.initial_delay.as_millis() as u64;
        let exp_ms = initial_ms.saturating_mul(1u64 << attempt.min(32));
        let capped_ms = exp_ms.min(self.max_delay.as_millis() as u64);
        let jitter_ms =
            (capped_ms as f64 * rand::thread_rng().gen_range(0.0..JITTER_FACTOR)) as u64;
        Duration::from_millis(capped_ms + jitter_ms)
    }
}

/// Invoke `op` up to `policy.max_attempts` times.
///
/// Fatal errors propagate immediately after a single invocation. Retryable
/// errors trigger a backoff sleep and another attempt; the last error
/// propagates once attempts are exhausted, with no sleep after the final one.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    E: RetryClass + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retryable failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
