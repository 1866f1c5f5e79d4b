//! Bounded exponential backoff for adapter calls.

use std::future::Future;
use std::time::Duration;

use log::*;

use crate::error::{Error, FailureKind};

/// Retry policy applied around every adapter call.
///
/// Transient provider errors and malformed responses have separate budgets. Everything
/// else fails on the first attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    transient_budget: u32,
    malformed_budget: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 2)
    }
}

impl RetryPolicy {
    /// Create a new retry policy with a 1s base delay capped at 60s.
    ///
    /// # Arguments
    ///
    /// * `transient_budget` - Maximum retries after network, timeout, rate limit and 5xx failures
    /// * `malformed_budget` - Maximum retries after responses that violate the expected shape
    pub fn new(transient_budget: u32, malformed_budget: u32) -> Self {
        Self {
            transient_budget,
            malformed_budget,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }

    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay.max(base_delay);
        self
    }

    /// Calculate exponential backoff delay.
    fn exponential_delay(&self, n_past_retries: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * 2_f64.powi(n_past_retries as i32);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    /// Delay before the next attempt, honoring a provider's rate-limit hint.
    fn delay_for(&self, err: &Error, n_past_retries: u32) -> Duration {
        let delay = self.exponential_delay(n_past_retries);
        match err {
            Error::RateLimited {
                retry_after_seconds,
            } => delay
                .max(Duration::from_secs(*retry_after_seconds))
                .min(self.max_delay),
            _ => delay,
        }
    }

    fn has_budget(&self, err: &Error, transient_retries: u32, malformed_retries: u32) -> bool {
        match err.kind() {
            FailureKind::TransientProvider => transient_retries < self.transient_budget,
            FailureKind::MalformedResponse => malformed_retries < self.malformed_budget,
            FailureKind::AuthOrQuota | FailureKind::Validation => false,
        }
    }

    /// Runs `call` until it succeeds, fails terminally, or exhausts its budget.
    ///
    /// `call` receives the zero-based attempt number.
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, Error>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut transient_retries = 0;
        let mut malformed_retries = 0;

        loop {
            let attempt = transient_retries + malformed_retries;
            let err = match call(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !self.has_budget(&err, transient_retries, malformed_retries) {
                if err.is_retryable() {
                    warn!(
                        "{operation} failed after {} attempt(s): {err}",
                        attempt + 1
                    );
                } else {
                    warn!("{operation} failed with a terminal error: {err}");
                }
                return Err(err);
            }

            let delay = self.delay_for(&err, attempt);
            info!(
                "{operation} attempt {} failed ({err}), retrying in {}ms",
                attempt + 1,
                delay.as_millis()
            );

            match err.kind() {
                FailureKind::MalformedResponse => malformed_retries += 1,
                _ => transient_retries += 1,
            }

            tokio::time::sleep(delay).await;
        }
    }
}
