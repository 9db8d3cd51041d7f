//! Policy consulted by [`retry_async`](crate::retry_async) between attempts.
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::time::Duration;

use crate::status::{RetryStatus, StatusHandle};

/// Boxed future returned by asynchronous policy callbacks.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Notification hook receiving a value (error or success) and the live status.
pub type Hook<V, T, E> = Box<dyn Fn(&V, &RetryStatus<T, E>) + Send + Sync>;

/// Decides whether another attempt is permitted after a failure.
pub enum Retries<T, E> {
    /// Retry while fewer than `n` retries have been issued.
    Fixed(u32),
    /// Retry every failure.
    Unlimited,
    /// Ask an asynchronous predicate, see [`Retries::when`].
    Predicate(Box<dyn FnMut(StatusHandle<T, E>) -> BoxFuture<bool> + Send>),
}

impl<T, E> Retries<T, E> {
    /// Retries while `predicate` resolves to `true`.
    ///
    /// The predicate runs after the failure has been recorded, so
    /// `status.read(|s| s.last_error())` is the failure being judged.
    pub fn when<P, F>(mut predicate: P) -> Self
    where
        P: FnMut(StatusHandle<T, E>) -> F + Send + 'static,
        F: Future<Output = bool> + Send + 'static,
    {
        Retries::Predicate(Box::new(move |status| Box::pin(predicate(status))))
    }
}

impl<T, E> Default for Retries<T, E> {
    fn default() -> Self {
        Retries::Fixed(0)
    }
}

impl<T, E> fmt::Debug for Retries<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Retries::Fixed(n) => f.debug_tuple("Fixed").field(n).finish(),
            Retries::Unlimited => f.write_str("Unlimited"),
            Retries::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// How long to wait before the next attempt.
///
/// Every variant except [`Delay::Custom`] yields a duration the orchestrator sleeps for.
/// A custom delay performs the wait itself and the orchestrator adds nothing on top.
pub enum Delay<T, E> {
    /// Next attempt starts immediately.
    None,
    /// Same wait before every retry.
    Fixed(Duration),
    /// Waits for the next duration of an iterator such as
    /// [`Exponential`](crate::strategy::Exponential). Once the iterator runs dry the
    /// remaining retries are not delayed.
    Strategy(Box<dyn Iterator<Item = Duration> + Send>),
    /// Derives the wait from the status, see [`Delay::compute`].
    Compute(Box<dyn FnMut(&RetryStatus<T, E>) -> Duration + Send>),
    /// Hands the whole wait to the caller, see [`Delay::custom`].
    Custom(Box<dyn FnMut(StatusHandle<T, E>) -> BoxFuture<()> + Send>),
}

impl<T, E> Delay<T, E> {
    /// Waits for successive durations of `strategy`.
    pub fn strategy<I>(strategy: I) -> Self
    where
        I: IntoIterator<Item = Duration>,
        I::IntoIter: Send + 'static,
    {
        Delay::Strategy(Box::new(strategy.into_iter()))
    }

    /// Computes the wait from a snapshot of the status. Called after `count` has been
    /// incremented for the upcoming retry.
    pub fn compute<C>(compute: C) -> Self
    where
        C: FnMut(&RetryStatus<T, E>) -> Duration + Send + 'static,
    {
        Delay::Compute(Box::new(compute))
    }

    /// Lets `wait` decide when the next attempt starts: it begins as soon as the returned
    /// future completes.
    pub fn custom<W, F>(mut wait: W) -> Self
    where
        W: FnMut(StatusHandle<T, E>) -> F + Send + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        Delay::Custom(Box::new(move |status| Box::pin(wait(status))))
    }
}

impl<T, E> Default for Delay<T, E> {
    fn default() -> Self {
        Delay::None
    }
}

impl<T, E> fmt::Debug for Delay<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delay::None => f.write_str("None"),
            Delay::Fixed(d) => f.debug_tuple("Fixed").field(d).finish(),
            Delay::Strategy(_) => f.write_str("Strategy(..)"),
            Delay::Compute(_) => f.write_str("Compute(..)"),
            Delay::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Retry budget, delay and notification hooks for one call to
/// [`retry_async`](crate::retry_async).
///
/// Hooks receive a snapshot of the status taken when they fire, and the live status is
/// not locked while they run, so a hook may use a [`Settle`](crate::Settle) or
/// [`StatusHandle`] it kept from an attempt.
///
/// ```
/// use std::time::Duration;
/// use reattempt::{Delay, RetryOptions};
///
/// let options = RetryOptions::<u32, String>::new()
///     .with_retries(3)
///     .with_delay(Delay::compute(|status| Duration::from_millis(100) * status.count()))
///     .on_retry(|error, status| eprintln!("retry #{} after {error}", status.count() + 1));
/// ```
pub struct RetryOptions<T, E> {
    pub(crate) retries: Retries<T, E>,
    pub(crate) delay: Delay<T, E>,
    on_retry: Option<Hook<E, T, E>>,
    on_rejected: Option<Hook<E, T, E>>,
    on_resolved: Option<Hook<T, T, E>>,
}

impl<T, E> Default for RetryOptions<T, E> {
    fn default() -> Self {
        RetryOptions {
            retries: Retries::default(),
            delay: Delay::default(),
            on_retry: None,
            on_rejected: None,
            on_resolved: None,
        }
    }
}

impl<T, E> fmt::Debug for RetryOptions<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("retries", &self.retries)
            .field("delay", &self.delay)
            .field("on_retry", &self.on_retry.is_some())
            .field("on_rejected", &self.on_rejected.is_some())
            .field("on_resolved", &self.on_resolved.is_some())
            .finish()
    }
}

impl<T, E> RetryOptions<T, E> {
    /// No retries, no delay, no hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Permits up to `retries` retries after the first attempt.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Retries::Fixed(retries);
        self
    }

    /// Replaces the retry budget, e.g. with [`Retries::Unlimited`] or [`Retries::when`].
    pub fn with_retry_policy(mut self, retries: Retries<T, E>) -> Self {
        self.retries = retries;
        self
    }

    /// Sets how long to wait between attempts.
    pub fn with_delay(mut self, delay: Delay<T, E>) -> Self {
        self.delay = delay;
        self
    }

    /// Shorthand for `with_delay(Delay::Fixed(delay))`.
    pub fn with_fixed_delay(mut self, delay: Duration) -> Self {
        self.delay = Delay::Fixed(delay);
        self
    }

    /// Called before each retry, while `count` still holds the number of retries issued
    /// before this one.
    ///
    /// Hooks are synchronous and are not awaited; spawn a task (`tokio::spawn`) for async
    /// work such as reporting.
    pub fn on_retry<H>(mut self, hook: H) -> Self
    where
        H: Fn(&E, &RetryStatus<T, E>) + Send + Sync + 'static,
    {
        self.on_retry = Some(Box::new(hook));
        self
    }

    /// Called once when the session fails for good.
    pub fn on_rejected<H>(mut self, hook: H) -> Self
    where
        H: Fn(&E, &RetryStatus<T, E>) + Send + Sync + 'static,
    {
        self.on_rejected = Some(Box::new(hook));
        self
    }

    /// Called once when the session succeeds.
    pub fn on_resolved<H>(mut self, hook: H) -> Self
    where
        H: Fn(&T, &RetryStatus<T, E>) + Send + Sync + 'static,
    {
        self.on_resolved = Some(Box::new(hook));
        self
    }

    pub(crate) fn notify_retry(&self, error: &E, status: &RetryStatus<T, E>) {
        notify("on_retry", self.on_retry.as_ref(), error, status);
    }

    pub(crate) fn notify_rejected(&self, error: &E, status: &RetryStatus<T, E>) {
        notify("on_rejected", self.on_rejected.as_ref(), error, status);
    }

    pub(crate) fn notify_resolved(&self, value: &T, status: &RetryStatus<T, E>) {
        notify("on_resolved", self.on_resolved.as_ref(), value, status);
    }
}

/// Hooks are observers: a panicking hook is logged and otherwise ignored.
fn notify<V, T, E>(
    name: &'static str,
    hook: Option<&Hook<V, T, E>>,
    value: &V,
    status: &RetryStatus<T, E>,
) {
    let Some(hook) = hook else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| hook(value, status))).is_err() {
        tracing::warn!(
            hook = name,
            retries = status.count(),
            "retry notification hook panicked; continuing"
        );
    }
}
