//! Bounded retry with an injectable delay strategy.
//!
//! The combinator knows nothing about HTTP: any async operation returning a
//! `Result` can be retried, which keeps it testable with plain closures and
//! the mock provider.

use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Decides how long to wait after a failed attempt.
pub trait DelayStrategy: Send + Sync {
    /// Delay before the next attempt. `attempt` is the zero-based index of the attempt that failed.
    fn delay(&self, attempt: u32) -> Duration;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoDelay;

impl DelayStrategy for NoDelay {
    fn delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay(pub Duration);

impl DelayStrategy for FixedDelay {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// `base + attempt * increment`. A zero increment degrades to a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    pub base: Duration,
    pub increment: Duration,
}

impl LinearBackoff {
    #[must_use]
    pub const fn new(base: Duration, increment: Duration) -> Self {
        Self { base, increment }
    }
}

impl DelayStrategy for LinearBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_add(self.increment.saturating_mul(attempt))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy<D = LinearBackoff> {
    max_attempts: u32,
    delay: D,
}

impl<D: DelayStrategy> RetryPolicy<D> {
    /// `max_attempts` is clamped to at least one.
    #[must_use]
    pub fn new(max_attempts: u32, delay: D) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn delay_strategy(&self) -> &D {
        &self.delay
    }
}

/// All attempts failed; carries the last error.
#[derive(Debug, thiserror::Error)]
#[error("gave up after {attempts} attempt(s): {last}")]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last: E,
}

/// Run `op` until it succeeds or the policy's attempt budget is spent.
///
/// `op` receives the zero-based attempt index. Between failed attempts the
/// policy's delay is awaited; there is no delay after the final attempt.
///
/// # Errors
///
/// Returns [`RetryExhausted`] with the error of the last attempt.
pub async fn retry_with<T, E, D, F, Fut>(
    policy: &RetryPolicy<D>,
    label: &str,
    mut op: F,
) -> Result<T, RetryExhausted<E>>
where
    D: DelayStrategy,
    E: fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.max_attempts;
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!("{label} succeeded on attempt {}/{attempts}", attempt + 1);
                }
                return Ok(value);
            }
            Err(e) => {
                if attempt + 1 >= attempts {
                    return Err(RetryExhausted { attempts, last: e });
                }
                let delay = policy.delay.delay(attempt);
                tracing::debug!(
                    "{label} failed on attempt {}/{attempts}, retrying in {}ms: {e}",
                    attempt + 1,
                    delay.as_millis()
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}
