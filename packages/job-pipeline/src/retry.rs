//! Bounded retry with exponential backoff.
//!
//! One controller wraps every flaky call in the pipeline: source fetches,
//! detail-page fetches, AI requests and per-job summarization. Callers supply a
//! [`RetryPolicy`] and an operation whose error implements [`Retryable`].
//! Fatal errors are returned after the first attempt, never retried.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::debug;

/// Classifies an error as worth another attempt or not.
pub trait Retryable {
    /// Whether the operation could succeed if attempted again.
    fn is_retryable(&self) -> bool;

    /// Server-provided minimum wait before the next attempt.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Retry limits and backoff schedule.
///
/// Attempt `n` (1-based) is followed by a wait of `base_delay * 2^(n-1)`,
/// capped by `max_delay` and by what remains of `max_elapsed`. Whichever of
/// `max_attempts` or `max_elapsed` runs out first ends the loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first (at least 1)
    pub max_attempts: u32,

    /// Wait after the first failed attempt
    pub base_delay: Duration,

    /// Upper bound on a single wait
    pub max_delay: Duration,

    /// Upper bound on total time spent, measured from the first attempt
    pub max_elapsed: Option<Duration>,

    /// Add up to 10% random jitter to each wait
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_elapsed: None,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// HTTP-level policy: 8 tries within 60 seconds.
    pub fn http() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(20),
            max_elapsed: Some(Duration::from_secs(60)),
            jitter: true,
        }
    }

    /// Per-job summarization policy: 5 attempts.
    pub fn summarize() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            max_elapsed: None,
            jitter: true,
        }
    }

    /// Set the attempt limit.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the first backoff delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the per-wait cap.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the total time budget.
    pub fn with_max_elapsed(mut self, budget: Duration) -> Self {
        self.max_elapsed = Some(budget);
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Check the policy is usable.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".into());
        }
        if self.max_delay < self.base_delay {
            return Err("max_delay must not be below base_delay".into());
        }
        Ok(())
    }

    /// Backoff before attempt `attempt + 1`, without jitter or budget cap.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let mut delay = self.backoff(attempt);
        if let Some(hint) = hint {
            delay = delay.max(hint);
        }
        if self.jitter && !delay.is_zero() {
            let fraction: f64 = rand::thread_rng().gen_range(0.0..0.1);
            delay += Duration::from_millis((delay.as_millis() as f64 * fraction) as u64);
        }
        delay
    }

    /// Run `operation` under this policy.
    pub async fn run<F, Fut, T, E>(&self, operation: F) -> Result<Retried<T>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        self.run_observed(operation, |_| {}).await
    }

    /// Run `operation` under this policy, reporting each failed attempt
    /// that will be retried to `observe`.
    pub async fn run_observed<F, Fut, T, E, O>(
        &self,
        mut operation: F,
        mut observe: O,
    ) -> Result<Retried<T>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
        O: FnMut(&RetryAttempt<'_, E>),
    {
        let max_attempts = self.max_attempts.max(1);
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let error = match operation().await {
                Ok(value) => {
                    return Ok(Retried {
                        value,
                        attempts: attempt,
                    })
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                debug!(attempt, error = %error, "Non-retryable failure");
                return Err(RetryError::Fatal {
                    error,
                    attempts: attempt,
                });
            }

            if attempt >= max_attempts {
                return Err(RetryError::Exhausted {
                    error,
                    attempts: attempt,
                });
            }

            let mut delay = self.delay_for(attempt, error.retry_after());
            if let Some(budget) = self.max_elapsed {
                let remaining = budget.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    return Err(RetryError::DeadlineExceeded {
                        error,
                        attempts: attempt,
                    });
                }
                delay = delay.min(remaining);
            }

            observe(&RetryAttempt {
                attempt,
                error: &error,
                delay,
            });
            debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying after backoff"
            );

            tokio::time::sleep(delay).await;
        }
    }
}

/// A failed attempt that is about to be retried.
#[derive(Debug)]
pub struct RetryAttempt<'a, E> {
    /// 1-based number of the attempt that failed
    pub attempt: u32,
    pub error: &'a E,
    /// Wait before the next attempt
    pub delay: Duration,
}

/// A successful result and the number of attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Terminal failure of a retried operation.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was not retryable; returned immediately
    Fatal { error: E, attempts: u32 },

    /// `max_attempts` attempts all failed
    Exhausted { error: E, attempts: u32 },

    /// The elapsed-time budget ran out first
    DeadlineExceeded { error: E, attempts: u32 },
}

impl<E> RetryError<E> {
    /// Attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Fatal { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::DeadlineExceeded { attempts, .. } => *attempts,
        }
    }

    /// The last error seen.
    pub fn error(&self) -> &E {
        match self {
            Self::Fatal { error, .. }
            | Self::Exhausted { error, .. }
            | Self::DeadlineExceeded { error, .. } => error,
        }
    }

    /// Consume into the last error seen.
    pub fn into_error(self) -> E {
        match self {
            Self::Fatal { error, .. }
            | Self::Exhausted { error, .. }
            | Self::DeadlineExceeded { error, .. } => error,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal { error, attempts } => {
                write!(f, "fatal error after {attempts} attempt(s): {error}")
            }
            Self::Exhausted { error, attempts } => {
                write!(f, "gave up after {attempts} attempts: {error}")
            }
            Self::DeadlineExceeded { error, attempts } => {
                write!(f, "retry deadline exceeded after {attempts} attempts: {error}")
            }
        }
    }
}

impl<E> std::error::Error for RetryError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error())
    }
}
