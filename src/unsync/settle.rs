use std::fmt;
use std::sync::Arc;

use tokio::sync::Notify;

use crate::status::StatusHandle;

/// Side channel handed to every attempt to force the outcome of the session.
///
/// Lets an operation decide success or failure from the content of a response rather than
/// from its own return value. The first settlement of a session wins, whether it comes
/// through this handle or from an attempt's return value. Later calls are no-ops and
/// return `false`.
///
/// A forced rejection is terminal: no further attempts run, whatever the retry budget.
pub struct Settle<T, E> {
    status: StatusHandle<T, E>,
    signal: Arc<Notify>,
}

impl<T, E> Settle<T, E> {
    pub(crate) fn new(status: StatusHandle<T, E>, signal: Arc<Notify>) -> Self {
        Settle { status, signal }
    }

    /// Resolves the session with `value`. Returns whether this call settled it.
    pub fn resolve(&self, value: T) -> bool {
        let won = self.status.lock().try_resolve(value);
        if won {
            self.signal.notify_one();
        }
        won
    }

    /// Rejects the session with `reason`, bypassing the retry budget. Returns whether
    /// this call settled it.
    pub fn reject(&self, reason: E) -> bool {
        let won = self.status.lock().try_reject(reason);
        if won {
            self.signal.notify_one();
        }
        won
    }

    /// Whether the session already has an outcome.
    pub fn is_settled(&self) -> bool {
        self.status.is_settled()
    }
}

impl<T, E> Clone for Settle<T, E> {
    fn clone(&self) -> Self {
        Settle {
            status: self.status.clone(),
            signal: Arc::clone(&self.signal),
        }
    }
}

impl<T, E> fmt::Debug for Settle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settle")
            .field("settled", &self.is_settled())
            .finish()
    }
}
