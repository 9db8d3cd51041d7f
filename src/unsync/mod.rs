//! Asynchronous retry orchestration with a live status and a forced-settlement side channel.
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::time::sleep;

use crate::options::{Delay, Retries, RetryOptions};
use crate::status::StatusHandle;

mod settle;
pub use settle::Settle;

/// Where a session currently is. Each pass of the loop in [`retry_async`] moves it on.
enum Phase<T, E> {
    Attempting,
    EvaluatingRetry(E),
    Delaying,
    Settled(Result<T, E>),
}

/// Run an asynchronous operation, retrying it according to `options` until it succeeds, is
/// explicitly rejected, or runs out of retries.
///
/// Each attempt receives a [`Settle`] handle and a [`StatusHandle`] on the live status of
/// the session. An attempt completes through whichever happens first:
///
/// * it returns `Ok(value)` or `Err(error)` (anything convertible into a `Result`), or
/// * it calls [`Settle::resolve`] or [`Settle::reject`]. The attempt's future is dropped
///   as soon as the session is settled this way, and whatever it would have returned is
///   ignored.
///
/// A failure is recorded in the status and then judged by the retry budget. A forced
/// rejection is final regardless of the budget, and a resolved session is never
/// overturned by a failure that arrives later.
///
/// # Parameters
///
/// * `operation` - Called once per attempt, typically a closure returning an `async` block.
/// * `options` - Retry budget, delay and notification hooks, see [`RetryOptions`].
///
/// # Returns
///
/// `Ok(T)` with the value the session resolved with, or `Err(E)` with the error that ended
/// it: the forced rejection reason if there was one, otherwise the last failure.
///
/// # Examples
///
/// ```
/// use reattempt::{RetryOptions, retry_async};
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut calls = 0;
/// let result = retry_async(
///     |_settle, _status| {
///         calls += 1;
///         let attempt = calls;
///         async move {
///             if attempt < 3 { Err("busy") } else { Ok(attempt) }
///         }
///     },
///     RetryOptions::new().with_retries(5),
/// )
/// .await;
///
/// assert_eq!(result, Ok(3));
/// # }
/// ```
///
/// Deciding from the content of a response:
///
/// ```
/// use reattempt::{RetryOptions, retry_async};
///
/// # struct Reply { ok: bool, body: &'static str }
/// # async fn send() -> Result<Reply, String> { Ok(Reply { ok: false, body: "chat not found" }) }
/// # #[tokio::main]
/// # async fn main() {
/// let result = retry_async(
///     |settle, _status| async move {
///         let reply = send().await?;
///         if !reply.ok {
///             // A well-formed refusal; retrying will not help.
///             settle.reject(reply.body.to_string());
///         }
///         Ok::<_, String>(reply.body)
///     },
///     RetryOptions::new().with_retries(3),
/// )
/// .await;
///
/// assert_eq!(result, Err("chat not found".to_string()));
/// # }
/// ```
pub async fn retry_async<OP, F, R, T, E>(
    mut operation: OP,
    mut options: RetryOptions<T, E>,
) -> Result<T, E>
where
    OP: FnMut(Settle<T, E>, StatusHandle<T, E>) -> F,
    F: Future<Output = R>,
    R: Into<Result<T, E>>,
    T: Clone,
    E: Clone,
{
    let status = StatusHandle::new();
    let signal = Arc::new(Notify::new());
    let mut phase = Phase::Attempting;

    loop {
        phase = match phase {
            Phase::Attempting => match forced_outcome(&status) {
                // A handle kept from an earlier attempt settled the session in between.
                Some(result) => Phase::Settled(result),
                None => {
                    let settle = Settle::new(status.clone(), Arc::clone(&signal));
                    let attempt = operation(settle, status.clone());
                    let returned = until_settled(attempt, &status, &signal).await;
                    conclude_attempt(&status, returned.map(Into::into))
                }
            },
            Phase::EvaluatingRetry(error) => {
                evaluate(&status, &signal, &mut options, error).await
            }
            Phase::Delaying => {
                // A settlement cuts the wait short; the next pass picks it up.
                until_settled(wait(&status, &mut options.delay), &status, &signal).await;
                Phase::Attempting
            }
            Phase::Settled(result) => return finish(&status, &options, result),
        };
    }
}

fn forced_outcome<T: Clone, E: Clone>(status: &StatusHandle<T, E>) -> Option<Result<T, E>> {
    status.read(|current| {
        if let Some(value) = current.resolved() {
            Some(Ok(value.clone()))
        } else {
            current.rejected().map(|reason| Err(reason.clone()))
        }
    })
}

/// Drives `future` until it completes or the side channel settles the session.
///
/// `None` means the session was settled through [`Settle`] first; `future` is dropped.
async fn until_settled<F, T, E>(
    future: F,
    status: &StatusHandle<T, E>,
    signal: &Notify,
) -> Option<F::Output>
where
    F: Future,
{
    let mut future = pin!(future);
    loop {
        tokio::select! {
            biased;
            output = &mut future => return Some(output),
            _ = signal.notified() => {
                if status.is_settled() {
                    return None;
                }
            }
        }
    }
}

/// Classifies a finished attempt. A forced settlement takes precedence over the value the
/// attempt returned.
fn conclude_attempt<T: Clone, E: Clone>(
    status: &StatusHandle<T, E>,
    returned: Option<Result<T, E>>,
) -> Phase<T, E> {
    let mut current = status.lock();
    if let Some(value) = current.resolved() {
        return Phase::Settled(Ok(value.clone()));
    }
    if let Some(reason) = current.rejected() {
        return Phase::EvaluatingRetry(reason.clone());
    }
    match returned {
        Some(Ok(value)) => {
            current.try_resolve(value.clone());
            Phase::Settled(Ok(value))
        }
        Some(Err(error)) => Phase::EvaluatingRetry(error),
        // Only reachable once settled, which the checks above already picked up.
        None => Phase::Attempting,
    }
}

/// Records a failure and decides between another attempt and a final rejection.
async fn evaluate<T: Clone, E: Clone>(
    status: &StatusHandle<T, E>,
    signal: &Notify,
    options: &mut RetryOptions<T, E>,
    error: E,
) -> Phase<T, E> {
    {
        let mut current = status.lock();
        if let Some(value) = current.resolved() {
            return Phase::Settled(Ok(value.clone()));
        }
        current.record_failure(error.clone());
        if let Some(reason) = current.rejected() {
            return Phase::Settled(Err(reason.clone()));
        }
    }

    let retries = status.count();
    let should_retry = match &mut options.retries {
        Retries::Fixed(budget) => retries < *budget,
        Retries::Unlimited => true,
        Retries::Predicate(predicate) => {
            until_settled(predicate(status.clone()), status, signal)
                .await
                .unwrap_or(false)
        }
    };

    let before_retry = {
        let mut current = status.lock();
        // The side channel may have fired while the predicate was running.
        if let Some(value) = current.resolved() {
            return Phase::Settled(Ok(value.clone()));
        }
        if let Some(reason) = current.rejected() {
            return Phase::Settled(Err(reason.clone()));
        }

        if !should_retry {
            tracing::debug!(
                retries,
                failures = current.errors().len(),
                "no retries left; rejecting"
            );
            current.try_reject(error.clone());
            return Phase::Settled(Err(error));
        }

        let before_retry = current.clone();
        current.bump_count();
        tracing::debug!(retry = current.count(), "scheduling retry");
        before_retry
    };

    options.notify_retry(&error, &before_retry);
    Phase::Delaying
}

async fn wait<T: Clone, E: Clone>(status: &StatusHandle<T, E>, delay: &mut Delay<T, E>) {
    let duration = match delay {
        Delay::None => return,
        Delay::Fixed(duration) => *duration,
        Delay::Strategy(strategy) => match strategy.next() {
            Some(duration) => duration,
            None => return,
        },
        Delay::Compute(compute) => compute(&status.snapshot()),
        Delay::Custom(custom) => return custom(status.clone()).await,
    };
    tracing::debug!(?duration, "waiting before next attempt");
    sleep(duration).await;
}

/// Stamps the end of the session and fires the matching hook, with the lock released.
fn finish<T: Clone, E: Clone>(
    status: &StatusHandle<T, E>,
    options: &RetryOptions<T, E>,
    result: Result<T, E>,
) -> Result<T, E> {
    let last = {
        let mut current = status.lock();
        current.finish();
        current.clone()
    };
    match &result {
        Ok(value) => options.notify_resolved(value, &last),
        Err(error) => options.notify_rejected(error, &last),
    }
    result
}
