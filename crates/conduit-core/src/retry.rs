//! Retry policy templates with bounded attempts, backoff and jitter.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConnectionError;
use crate::shutdown::ShutdownSignal;

/// Backoff strategy between connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed {
        #[serde(with = "humantime_serde")]
        delay: Duration,
    },
    /// Uses an exponential delay between retries.
    ///
    /// The delay is calculated as `base * (factor ^ attempt)`.
    Exponential {
        #[serde(with = "humantime_serde")]
        base: Duration,
        factor: f64,
        #[serde(with = "humantime_serde")]
        max: Duration,
        /// Whether to apply random jitter (+/- 50%) to the delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Fixed {
            delay: Duration::from_millis(2000),
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based). Never exceeds `max`
    /// before jitter is applied.
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                // NaN and factors below 1 leave the delay at `base`.
                let factor = factor.max(1.0);
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let nanos = base.as_nanos() as f64 * factor.powi(exponent);
                let delay = if nanos >= max.as_nanos() as f64 {
                    max
                } else {
                    Duration::from_nanos(nanos as u64)
                };

                if jitter {
                    jittered(delay)
                } else {
                    delay
                }
            }
        }
    }
}

/// Spreads `delay` uniformly over 50% to 150% of its length, at millisecond
/// resolution.
fn jittered(delay: Duration) -> Duration {
    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    let half = millis / 2;
    let offset = fastrand::u64(0..=half.saturating_mul(2));
    Duration::from_millis((millis - half).saturating_add(offset))
}

/// Reusable "attempt, and on failure retry under this policy" behaviour.
///
/// The attempt budget is always bounded: total attempts = `max_retries + 1`.
/// Only errors flagged as retryable are retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicyTemplate {
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicyTemplate {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicyTemplate {
    /// Exponential backoff starting at 200ms, capped at 3s, with jitter.
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(200),
                factor: 2.0,
                max: Duration::from_secs(3),
                jitter: true,
            },
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
        }
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            backoff: Backoff::Fixed {
                delay: Duration::ZERO,
            },
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error, or the
    /// budget is spent. Waiting between attempts is cut short by `shutdown`.
    pub async fn execute<T, F, Fut>(
        &self,
        target: &str,
        shutdown: &ShutdownSignal,
        mut operation: F,
    ) -> Result<T, ConnectionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ConnectionError>>,
    {
        let mut attempt = 0u32;
        loop {
            if shutdown.is_triggered() {
                return Err(ConnectionError::shutdown(format!(
                    "connect to '{target}' aborted by shutdown"
                )));
            }

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(target_name = target, attempts = attempt + 1, "connected after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !error.retryable() {
                return Err(error);
            }
            if attempt >= self.max_retries {
                warn!(
                    target_name = target,
                    attempts = attempt + 1,
                    error = %error,
                    "retry budget exhausted"
                );
                return Err(ConnectionError::retries_exhausted(attempt + 1, &error));
            }

            let delay = self.delay_for_attempt(attempt);
            warn!(
                target_name = target,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "connect attempt failed, retrying"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.triggered() => {
                    return Err(ConnectionError::shutdown(format!(
                        "retrying connect to '{target}' aborted by shutdown"
                    )));
                }
            }
            attempt += 1;
        }
    }
}
