use crate::error::RelayerError;
use observability::metrics::METRICS;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use typed_builder::TypedBuilder;
use validator::Validate;

const DEFAULT_MAX_ATTEMPTS: u32 = 4;
const DEFAULT_BASE_DELAY_MS: u64 = 2000;
const DEFAULT_RETRYABLE_STATUSES: [u16; 7] = [408, 425, 429, 500, 502, 503, 504];

/// Message fragments of transient failures that carry no HTTP status.
const TRANSIENT_MESSAGE_MARKERS: [&str; 3] = ["relayer respond", "fetch", "network"];

/// Retry policy of relayer calls: bounded attempts with linear backoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, TypedBuilder)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included.
    #[validate(range(min = 1))]
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,
    /// The delay after the n-th failed attempt is `n * base_delay_ms`.
    #[builder(default = DEFAULT_BASE_DELAY_MS)]
    pub base_delay_ms: u64,
    #[builder(default = DEFAULT_RETRYABLE_STATUSES.to_vec())]
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// Sleep before the attempt following `failed_attempts` failures.
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(failed_attempts)))
    }

    /// Whether `error` is transient.
    ///
    /// A failure carrying an HTTP status is classified by that status alone.
    /// Only failures without status fall back to message inspection.
    pub fn is_transient(&self, error: &RelayerError) -> bool {
        match error.status() {
            Some(status) => self.retryable_statuses.contains(&status),
            None => {
                let message = error.to_string().to_lowercase();
                TRANSIENT_MESSAGE_MARKERS
                    .iter()
                    .any(|marker| message.contains(marker))
            }
        }
    }
}

/// Runs `operation` until it succeeds, fails with a non transient error or
/// the attempt budget is spent; the last error is returned in the latter cases.
///
/// `operation` receives the 1-based attempt number.
pub async fn with_relayer_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &'static str,
    mut operation: F,
) -> Result<T, RelayerError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, RelayerError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        if attempt > 1 {
            tracing::warn!(
                "Retrying {operation_name} (attempt {attempt}/{})",
                policy.max_attempts
            );
        }
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt >= policy.max_attempts || !policy.is_transient(&e) {
                    tracing::error!("{operation_name} failed after {attempt} attempt(s): {e}");
                    return Err(e);
                }
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    "{operation_name} attempt {attempt} failed with a transient error, retrying in {}ms: {e}",
                    delay.as_millis()
                );
                if let Err(e) = METRICS.increment_retry_counter(operation_name) {
                    tracing::warn!("Failed to increment retry counter: {:?}", e);
                }
                tokio::time::sleep(delay).await;
            }
        }
    }
}
