use std::time::Duration;

use backon::{BlockingRetryable, ExponentialBuilder};
use serde::{Deserialize, Serialize};

use super::errors::VBaseApiError;

/// Exponential backoff applied to transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt, 0 disables retrying.
    pub max_retries: usize,
    #[serde(rename = "min_delay_ms", with = "millis")]
    pub min_delay: Duration,
    #[serde(rename = "max_delay_ms", with = "millis")]
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay.max(self.min_delay))
            .with_max_times(self.max_retries);

        if self.jitter {
            builder.with_jitter()
        } else {
            builder
        }
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the retry budget is spent. The last error is returned in the latter
    /// two cases.
    ///
    /// # Errors
    ///
    /// Whatever `operation` last failed with.
    pub fn run<T>(
        &self,
        operation: impl FnMut() -> Result<T, VBaseApiError>,
    ) -> Result<T, VBaseApiError> {
        operation
            .retry(self.backoff())
            .when(VBaseApiError::is_retryable)
            .notify(|err: &VBaseApiError, dur: Duration| {
                log::warn!(
                    "Request failed with {} ({}), retrying in {dur:?}",
                    err.kind(),
                    err.cause()
                );
            })
            .call()
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
