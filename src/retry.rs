//! Bounded retry around a single remote step.
//!
//! [`execute`] runs an operation up to [`RetryPolicy::max_attempts`] times.
//! It stops at the first success, at the first error the predicate does not
//! consider retryable, or when the attempts run out. Between retryable
//! failures it sleeps with exponential backoff, capped at
//! [`RetryPolicy::max_delay_ms`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::job::StepKind;

/// Retry behaviour shared by every step of every job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per step, first try included.
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Upper bound for a single backoff sleep.
    pub max_delay_ms: u64,
}

pub const DEFAULT_MAX_DELAY_MS: u64 = 60_000;

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt: `base_delay_ms * 2^(attempt - 1)`,
    /// never more than `max_delay_ms`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let delay = self.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Result of a step together with how many attempts it took.
#[derive(Debug)]
pub struct StepOutcome<T, E> {
    pub attempts: u32,
    pub result: Result<T, E>,
}

/// Runs `op` under `policy`. `op` receives the 1-based attempt number.
pub async fn execute<T, E, F, Fut>(
    step: StepKind,
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> StepOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        tracing::debug!(%step, attempt, max_attempts, "attempting step");

        let err = match op(attempt).await {
            Ok(value) => {
                return StepOutcome {
                    attempts: attempt,
                    result: Ok(value),
                };
            }
            Err(err) => err,
        };

        if attempt >= max_attempts || !is_retryable(&err) {
            tracing::debug!(%step, attempt, error = %err, "step failed terminally");
            return StepOutcome {
                attempts: attempt,
                result: Err(err),
            };
        }

        let delay = policy.delay_for_attempt(attempt);
        tracing::warn!(
            %step,
            attempt,
            max_attempts,
            error = %err,
            delay_ms = delay.as_millis() as u64,
            "retrying step"
        );
        sleep(delay).await;
    }
}
