//! Retry policy for remote APIs that answer with rate-limit hints.
//!
//! Many HTTP APIs reject bursts with a `429 Too Many Requests` carrying a "retry after N
//! seconds" hint. [`RateLimited`] waits exactly that long when the most recent failure is
//! such a rejection and falls back to [`Backoff`] for every other failure.
//!
//! # Example
//! ```
//! use std::fmt;
//! use std::time::Duration;
//! use reattempt::{RateLimited, RetryAfter, retry_async};
//!
//! #[derive(Clone, Debug)]
//! struct ApiError {
//!     code: u16,
//!     retry_after: Option<u64>,
//! }
//!
//! impl fmt::Display for ApiError {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         write!(f, "api error {}", self.code)
//!     }
//! }
//!
//! impl RetryAfter for ApiError {
//!     fn is_rate_limited(&self) -> bool {
//!         self.code == 429
//!     }
//!
//!     fn retry_after(&self) -> Option<Duration> {
//!         self.retry_after.map(Duration::from_secs)
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let options = RateLimited::new("getMe").with_retries(2).into_options();
//! let result = retry_async(
//!     |_, _| async { Err::<(), _>(ApiError { code: 429, retry_after: Some(1) }) },
//!     options,
//! )
//! .await;
//! assert_eq!(result.unwrap_err().code, 429);
//! # }
//! ```
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use crate::options::{Delay, RetryOptions};
use crate::status::RetryStatus;
use crate::strategy::Backoff;

/// Wait used when a rate-limited error carries no hint.
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(30);

/// Retries granted by [`RateLimited::new`].
pub const DEFAULT_RETRIES: u32 = 5;

/// Errors that can tell a rate-limit rejection apart from other failures.
pub trait RetryAfter {
    /// Whether the server refused the call because of rate limiting.
    fn is_rate_limited(&self) -> bool;

    /// The wait the server asked for, if it sent one.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Builds [`RetryOptions`] that honour server rate-limit hints.
#[derive(Debug, Clone)]
pub struct RateLimited {
    service: Arc<str>,
    retries: u32,
    backoff: Backoff,
    default_wait: Duration,
}

impl RateLimited {
    /// A policy for calls to `service`, which labels every log event.
    ///
    /// Defaults to [`DEFAULT_RETRIES`] retries, [`Backoff::default`] and
    /// [`DEFAULT_RATE_LIMIT_WAIT`].
    pub fn new(service: impl Into<Arc<str>>) -> Self {
        RateLimited {
            service: service.into(),
            retries: DEFAULT_RETRIES,
            backoff: Backoff::default(),
            default_wait: DEFAULT_RATE_LIMIT_WAIT,
        }
    }

    /// Number of retries after the first attempt.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Backoff used for failures that are not rate limited.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Wait used for rate-limited errors without a hint.
    pub fn with_default_wait(mut self, wait: Duration) -> Self {
        self.default_wait = wait;
        self
    }

    /// The wait before the next attempt. Called after `count` was incremented for it.
    pub fn delay_for<T, E: RetryAfter>(&self, status: &RetryStatus<T, E>) -> Duration {
        match status.last_error() {
            Some(last) if last.error.is_rate_limited() => {
                let wait = last.error.retry_after().unwrap_or(self.default_wait);
                tracing::info!(
                    service = %self.service,
                    retry = status.count(),
                    wait_secs = wait.as_secs_f64(),
                    "rate limited; waiting before retry"
                );
                wait
            }
            _ => self.backoff.delay_for(status.count()),
        }
    }

    /// Turns the policy into options for [`retry_async`](crate::retry_async), logging
    /// retries and the final rejection through `tracing`.
    pub fn into_options<T, E>(self) -> RetryOptions<T, E>
    where
        T: 'static,
        E: RetryAfter + Display + 'static,
    {
        let retry_service = Arc::clone(&self.service);
        let rejected_service = Arc::clone(&self.service);
        let retries = self.retries;

        RetryOptions::new()
            .with_retries(retries)
            .on_retry(move |error: &E, status: &RetryStatus<T, E>| {
                if error.is_rate_limited() {
                    tracing::warn!(
                        service = %retry_service,
                        retry_after_secs = error.retry_after().map(|wait| wait.as_secs()),
                        %error,
                        "rate limit error"
                    );
                } else {
                    tracing::warn!(
                        service = %retry_service,
                        attempt = status.count() + 1,
                        %error,
                        "retrying after failure"
                    );
                }
            })
            .on_rejected(move |error: &E, status: &RetryStatus<T, E>| {
                tracing::error!(
                    service = %rejected_service,
                    retries = status.count(),
                    duration_ms = status.duration_ms() as u64,
                    %error,
                    "all retry attempts failed"
                );
            })
            .with_delay(Delay::compute(move |status: &RetryStatus<T, E>| {
                self.delay_for(status)
            }))
    }
}
