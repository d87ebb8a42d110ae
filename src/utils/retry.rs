use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay_ms: initial_delay.as_millis() as u64,
        }
    }

    /// Un-jittered delay after the given (1-based) failed attempt.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.initial_delay_ms.saturating_mul(factor))
    }

    pub fn jittered_delay(&self, attempt: u32, jitter: f64) -> Duration {
        self.base_delay(attempt).mul_f64(jitter.clamp(0.5, 1.5))
    }
}

/// Runs `operation` until it succeeds or `policy.max_retries` attempts are
/// spent, sleeping `initial * 2^(attempt-1)` scaled by a random factor in
/// `[0.5, 1.5)` between attempts. The last error is returned unchanged.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    thread_id: Option<&str>,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let prefix = thread_id.map(|id| format!("{} ", id)).unwrap_or_default();
    let max_retries = policy.max_retries.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt >= max_retries => return Err(error),
            Err(error) => {
                let jitter = rand::thread_rng().gen_range(0.5..1.5);
                let delay = policy.jittered_delay(attempt, jitter);
                tracing::warn!(
                    "{}Attempt {}/{} calling {} failed: {}",
                    prefix,
                    attempt,
                    max_retries,
                    operation_name,
                    error
                );
                tracing::info!("{}Retrying in {:.1} seconds...", prefix, delay.as_secs_f64());
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
