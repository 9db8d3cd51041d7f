//! Bookkeeping for a single retry session.
//!
//! A [`RetryStatus`] is created by [`retry_async`](crate::retry_async) when a session starts
//! and is mutated only by the orchestrator and the [`Settle`](crate::Settle) side channel.
//! The operation, the retry predicate and custom delays read the same live instance through
//! a [`StatusHandle`]. Notification hooks and computed delays get a snapshot taken at the
//! moment they fire, so they see the most recent failure and retry count without holding
//! the lock.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

/// One failed attempt recorded in [`RetryStatus::errors`].
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptError<E> {
    /// The error the attempt failed with.
    pub error: E,
    /// When the failure was recorded.
    pub occurred_at: SystemTime,
}

/// Terminal state of a session. Moves out of `Pending` at most once.
#[derive(Debug, Clone, PartialEq)]
enum Outcome<T, E> {
    Pending,
    Resolved(T),
    Rejected(E),
}

/// Attempt count, timing and error history of one retry session.
#[derive(Debug, Clone)]
pub struct RetryStatus<T, E> {
    count: u32,
    start_at: SystemTime,
    started: Instant,
    end_at: Option<SystemTime>,
    duration: Duration,
    errors: Vec<AttemptError<E>>,
    outcome: Outcome<T, E>,
}

impl<T, E> RetryStatus<T, E> {
    pub(crate) fn new() -> Self {
        RetryStatus {
            count: 0,
            start_at: SystemTime::now(),
            started: Instant::now(),
            end_at: None,
            duration: Duration::ZERO,
            errors: Vec::new(),
            outcome: Outcome::Pending,
        }
    }

    /// Number of retries issued so far. Zero while the first attempt is running.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// When the session started.
    pub fn start_at(&self) -> SystemTime {
        self.start_at
    }

    /// When the session reached its terminal state, `None` while attempts are ongoing.
    pub fn end_at(&self) -> Option<SystemTime> {
        self.end_at
    }

    /// Time from the start of the session to the most recent failure.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// [`duration`](Self::duration) in whole milliseconds.
    pub fn duration_ms(&self) -> u128 {
        self.duration.as_millis()
    }

    /// Every failed attempt, oldest first.
    pub fn errors(&self) -> &[AttemptError<E>] {
        &self.errors
    }

    /// The most recent failure, if any.
    pub fn last_error(&self) -> Option<&AttemptError<E>> {
        self.errors.last()
    }

    /// The value the session resolved with.
    pub fn resolved(&self) -> Option<&T> {
        match &self.outcome {
            Outcome::Resolved(value) => Some(value),
            _ => None,
        }
    }

    /// The reason the session was rejected with.
    pub fn rejected(&self) -> Option<&E> {
        match &self.outcome {
            Outcome::Rejected(reason) => Some(reason),
            _ => None,
        }
    }

    /// Whether the session is resolved or rejected.
    pub fn is_settled(&self) -> bool {
        !matches!(self.outcome, Outcome::Pending)
    }

    /// Appends a failure and refreshes `duration`.
    ///
    /// Timestamps are derived from the monotonic clock so that `occurred_at` never goes
    /// backwards even if the wall clock does.
    pub(crate) fn record_failure(&mut self, error: E) {
        let elapsed = self.started.elapsed();
        self.errors.push(AttemptError {
            error,
            occurred_at: self.start_at + elapsed,
        });
        self.duration = elapsed;
    }

    pub(crate) fn bump_count(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    /// Stamps `end_at`. Only the first call has an effect.
    pub(crate) fn finish(&mut self) {
        if self.end_at.is_none() {
            self.end_at = Some(self.start_at + self.started.elapsed());
        }
    }

    /// Moves the session to `Resolved`, returns `false` if it was already settled.
    pub(crate) fn try_resolve(&mut self, value: T) -> bool {
        if self.is_settled() {
            return false;
        }
        self.outcome = Outcome::Resolved(value);
        true
    }

    /// Moves the session to `Rejected`, returns `false` if it was already settled.
    pub(crate) fn try_reject(&mut self, reason: E) -> bool {
        if self.is_settled() {
            return false;
        }
        self.outcome = Outcome::Rejected(reason);
        true
    }
}

/// Shared handle to the live [`RetryStatus`] of a session.
///
/// Cloning the handle is cheap; all clones observe the same status.
pub struct StatusHandle<T, E> {
    inner: Arc<Mutex<RetryStatus<T, E>>>,
}

impl<T, E> Clone for StatusHandle<T, E> {
    fn clone(&self) -> Self {
        StatusHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> std::fmt::Debug for StatusHandle<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.lock();
        f.debug_struct("StatusHandle")
            .field("count", &status.count)
            .field("errors", &status.errors.len())
            .field("settled", &status.is_settled())
            .finish()
    }
}

impl<T, E> StatusHandle<T, E> {
    pub(crate) fn new() -> Self {
        StatusHandle {
            inner: Arc::new(Mutex::new(RetryStatus::new())),
        }
    }

    /// Locks the status. A panic elsewhere never leaves the status half-written, so a
    /// poisoned lock is still safe to use.
    pub(crate) fn lock(&self) -> MutexGuard<'_, RetryStatus<T, E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` against the current status.
    ///
    /// Do not hold on to the borrow across an `.await`; copy out what you need instead.
    pub fn read<R>(&self, f: impl FnOnce(&RetryStatus<T, E>) -> R) -> R {
        f(&self.lock())
    }

    /// Copy of the status as it is now, detached from the lock.
    pub(crate) fn snapshot(&self) -> RetryStatus<T, E>
    where
        T: Clone,
        E: Clone,
    {
        self.lock().clone()
    }

    /// Shorthand for [`RetryStatus::count`].
    pub fn count(&self) -> u32 {
        self.lock().count()
    }

    /// Number of failures recorded so far.
    pub fn error_count(&self) -> usize {
        self.lock().errors.len()
    }

    /// Shorthand for [`RetryStatus::is_settled`].
    pub fn is_settled(&self) -> bool {
        self.lock().is_settled()
    }
}
