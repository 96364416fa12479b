use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::BrokerError;

const DEFAULT_MAX_RETRY_TIME: Duration = Duration::from_secs(60);
const DEFAULT_MAX_ATTEMPTS: u32 = 100;
const DEFAULT_WAIT_BETWEEN_RETRIES: Duration = Duration::from_secs(5);

/// Limits for the retry driver. Zero disables the corresponding limit.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Max total time to retry for before giving up. Zero for no time limit.
    pub max_retry_time: Duration,

    /// Max number of attempts before giving up. Zero for no attempt limit.
    pub max_attempts: u32,

    /// Fixed wait between attempts.
    pub wait_between_retries: Duration,
}

impl RetryConfig {
    /// Limits for operations that must eventually give up, such as the
    /// grant-token exchange.
    pub fn bounded() -> Self {
        Self {
            max_retry_time: DEFAULT_MAX_RETRY_TIME,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            wait_between_retries: DEFAULT_WAIT_BETWEEN_RETRIES,
        }
    }

    /// No limits: retries forever. Used while waiting for the broker, which
    /// may be in a long-running migration at boot.
    pub fn unbounded() -> Self {
        Self {
            max_retry_time: Duration::ZERO,
            max_attempts: 0,
            wait_between_retries: DEFAULT_WAIT_BETWEEN_RETRIES,
        }
    }
}

/// Which limit ended a bounded retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryLimit {
    MaxRetryTime(Duration),
    MaxAttempts(u32),
}

impl fmt::Display for RetryLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryLimit::MaxRetryTime(limit) => write!(f, "max retry time {limit:?}"),
            RetryLimit::MaxAttempts(limit) => write!(f, "max retry attempts {limit}"),
        }
    }
}

/// Run an operation until it succeeds or a limit from `cfg` is reached,
/// sleeping a fixed interval between attempts.
///
/// Limits are checked before each attempt, so an operation failing right at
/// the deadline is not retried once more. On exhaustion the error wraps the
/// last failure and names the limit that was hit.
pub async fn retry<T, F, Fut>(
    operation: &'static str,
    cfg: RetryConfig,
    mut op: F,
) -> Result<T, BrokerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BrokerError>>,
{
    let start = Instant::now();
    let mut attempt: u32 = 1;
    let mut last: BrokerError;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                debug!(operation, attempt, error = %err, "Retry attempt failed");
                last = err;
            }
        }

        sleep(cfg.wait_between_retries).await;
        attempt += 1;

        if !cfg.max_retry_time.is_zero() && start.elapsed() > cfg.max_retry_time {
            return Err(BrokerError::RetriesExhausted {
                operation,
                cause: RetryLimit::MaxRetryTime(cfg.max_retry_time),
                last: Box::new(last),
            });
        }

        if cfg.max_attempts > 0 && attempt > cfg.max_attempts {
            return Err(BrokerError::RetriesExhausted {
                operation,
                cause: RetryLimit::MaxAttempts(cfg.max_attempts),
                last: Box::new(last),
            });
        }
    }
}
