//! Delay strategies for retryable operations.
//!
//! Iterators here plug into [`Delay::strategy`](crate::Delay::strategy); [`Backoff`] can
//! also be evaluated directly against the retry count from a
//! [`Delay::compute`](crate::Delay::compute) callback.

/// Capped exponential backoff keyed by the retry count.
pub mod backoff;
pub use backoff::Backoff;

/// Each retry strategy is an iterator that yields a [`Duration`](std::time::Duration) for each retry.
pub mod exponential;
pub use exponential::Exponential;

#[cfg(feature = "random")]
mod random;
#[cfg(feature = "random")]
pub use random::{Range, jitter};
