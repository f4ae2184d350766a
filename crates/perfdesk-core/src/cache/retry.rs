// ── Retry with exponential backoff ──
//
// `delay(attempt) = min(base * 2^attempt, max)`, attempts counted from 0.
// No jitter: the bound and the schedule are part of the loader contract.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::key::QueryKey;

/// How many times a failing fetch is attempted, and how long to wait between
/// attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Delay after the first failure. Default: 1s.
    pub base_delay: Duration,
    /// Upper bound on any single delay. Default: 30s.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Wait before the attempt following failed attempt number `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// Run `op` until it succeeds or the policy's attempts are exhausted.
///
/// The last error is returned unchanged.
pub(crate) async fn run_with_retry<T, F, Fut>(
    key: &QueryKey,
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(key = %key, attempt, "fetch recovered after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt + 1 >= attempts => {
                warn!(key = %key, attempts, error = %e, "fetch failed, giving up");
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay(attempt);
                warn!(
                    key = %key,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
