// ABOUTME: RetryPolicy - bounded attempts with a pluggable backoff between them.
// ABOUTME: Waits and attempts are both abandoned as soon as the cancellation token fires.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RetryConfig;

type BackoffFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// How many times to try an operation and how long to wait in between.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: BackoffFn,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// `backoff(n)` is the wait after failed attempt `n` (1-based).
    /// At least one attempt is always made.
    pub fn new<F>(max_attempts: u32, backoff: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Arc::new(backoff),
        }
    }

    /// Waits `base × n²` after the n-th failure.
    pub fn quadratic(max_attempts: u32, base: Duration) -> Self {
        Self::new(max_attempts, move |n| base.saturating_mul(n.saturating_mul(n)))
    }

    /// Retries immediately.
    pub fn no_backoff(max_attempts: u32) -> Self {
        Self::new(max_attempts, |_| Duration::ZERO)
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::quadratic(config.max_attempts, config.base_backoff)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        (self.backoff)(failed_attempt)
    }

    /// Run `op` until it succeeds, attempts run out, or `cancel` fires.
    ///
    /// `op` receives the 1-based attempt number. On success returns the
    /// value together with the number of attempts used.
    pub async fn run<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<(T, u32), RetryError<E>>
    where
        E: fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled { attempts: attempt - 1 });
            }

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: attempt }),
                result = op(attempt) => result,
            };

            match result {
                Ok(value) => return Ok((value, attempt)),
                Err(e) if attempt >= self.max_attempts => {
                    return Err(RetryError::Exhausted { attempts: attempt, last: e });
                }
                Err(e) => {
                    let delay = self.backoff(attempt);
                    warn!(attempt, max_attempts = self.max_attempts, error = %e, "Attempt failed, retrying");
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off");
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: attempt }),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

/// Why [`RetryPolicy::run`] gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    Exhausted { attempts: u32, last: E },
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Cancelled { attempts } => *attempts,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted { attempts, last } => {
                write!(f, "gave up after {} attempts: {}", attempts, last)
            }
            RetryError::Cancelled { attempts } => {
                write!(f, "cancelled after {} attempts", attempts)
            }
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryError<E> {}
