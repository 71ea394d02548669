use crate::Result;
use std::future::Future;
use std::time::Duration;

/// RetryPolicy wraps control-plane calls with exponential-randomized
/// backoff. Only the control plane's distinguished throttle signal is
/// retried; every other error propagates on first occurrence.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_interval: Duration,
    max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_interval: Duration::from_secs(2),
            max_interval: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Run `op` to completion under this policy. After the final failed
    /// attempt the last error is surfaced unchanged.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(err) if err.is_throttle() && attempt + 1 < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    tracing::debug!(attempt, ?delay, "control plane throttled the request");
                    () = tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    // Exponential interval for `attempt`, jittered and capped.
    fn backoff(&self, attempt: u32) -> Duration {
        use rand::Rng;

        let interval = self
            .base_interval
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
            .min(self.max_interval);

        interval
            .mul_f64(rand::thread_rng().gen_range(0.8..=1.2))
            .min(self.max_interval)
    }
}
