use backoff::{backoff::Backoff, ExponentialBackoff};
use reportfetch_core::execution::ApiError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy for transient API failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, errors are returned immediately
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Run `operation` until it succeeds, fails permanently or the attempts are used up
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.initial_delay,
            current_interval: self.initial_delay,
            max_interval: self.max_delay,
            multiplier: self.multiplier,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) if !error.is_transient() => return Err(error),
                Err(error) if attempt >= self.max_attempts => {
                    if self.max_attempts > 1 {
                        warn!("Giving up after {attempt} attempts: {error}");
                    }
                    return Err(error);
                }
                Err(error) => match backoff.next_backoff() {
                    Some(delay) => {
                        debug!("Retrying after {delay:?} (attempt {attempt}): {error}");
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(error),
                },
            }
        }
    }
}
