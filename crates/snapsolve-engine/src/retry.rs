use std::time::Duration;

use crate::cancel::CancelToken;
use crate::error::SolveError;

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Retry policy shared by every backend request.
///
/// Attempt `n` (1-based retry index) waits `base_backoff * 2^(n-1)` before
/// running. Only errors accepted by `is_retryable` are retried, and a cancel
/// during the wait ends the loop with `SolveError::Canceled`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub is_retryable: fn(&SolveError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BACKOFF)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
            is_retryable: SolveError::is_retryable,
        }
    }

    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(1u32 << exponent)
    }

    /// Runs `op` until it succeeds, fails terminally, or the budget runs out.
    /// `op` receives the zero-based attempt number.
    pub fn run<T>(
        &self,
        cancel: &CancelToken,
        label: &str,
        mut op: impl FnMut(u32) -> Result<T, SolveError>,
    ) -> Result<T, SolveError> {
        let mut attempt = 0;
        loop {
            cancel.check()?;
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(SolveError::Canceled) => return Err(SolveError::Canceled),
                Err(err) if cancel.is_canceled() => {
                    tracing::debug!(label, error = %err, "dropping error from canceled request");
                    return Err(SolveError::Canceled);
                }
                Err(err) if (self.is_retryable)(&err) && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        label,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    if !cancel.sleep(delay) {
                        return Err(SolveError::Canceled);
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::Duration;

    use super::RetryPolicy;
    use crate::cancel::CancelToken;
    use crate::error::{ErrorKind, SolveError};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_millis(1))
    }

    fn bad_gateway() -> SolveError {
        SolveError::ServerError {
            status: 502,
            message: "Bad Gateway".to_string(),
        }
    }

    #[test]
    fn backoff_doubles_per_retry() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn succeeds_after_two_transient_failures() {
        let calls = Cell::new(0);
        let result = fast_policy().run(&CancelToken::new(), "extract", |_| {
            calls.set(calls.get() + 1);
            if calls.get() <= 2 {
                Err(bad_gateway())
            } else {
                Ok("ok")
            }
        });
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn surfaces_last_error_once_budget_is_spent() {
        let calls = Cell::new(0);
        let result: Result<(), _> = fast_policy().run(&CancelToken::new(), "extract", |_| {
            calls.set(calls.get() + 1);
            Err(bad_gateway())
        });
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ServerError);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn terminal_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), _> = fast_policy().run(&CancelToken::new(), "generate", |_| {
            calls.set(calls.get() + 1);
            Err(SolveError::CreditsExhausted(
                "API Key out of credits".to_string(),
            ))
        });
        assert_eq!(result.unwrap_err().kind(), ErrorKind::CreditsExhausted);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn cancel_wins_over_transport_classification() {
        let cancel = CancelToken::new();
        let calls = Cell::new(0);
        let result: Result<(), _> = fast_policy().run(&cancel, "debug", |_| {
            calls.set(calls.get() + 1);
            cancel.cancel();
            Err(SolveError::Network("connection reset".to_string()))
        });
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Canceled);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn pre_canceled_token_never_calls_op() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let result: Result<(), _> = fast_policy().run(&cancel, "extract", |_| {
            panic!("op must not run");
        });
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Canceled);
    }
}
