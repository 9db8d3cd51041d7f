//! # Reattempt
//!
//! An asynchronous retry orchestrator for operations that may fail.
//!
//! [`retry_async`] re-runs an operation until it succeeds, is explicitly rejected, or runs
//! out of retries. Every call owns a [`RetryStatus`] recording the retry count, timing and
//! every failure, and that status is shared live with the operation and the policy.
//!
//! ## Features
//!
//! - Retry budget as a fixed count, unlimited, or an async predicate over the status
//! - Delays that are fixed, drawn from a strategy iterator, computed from the status, or
//!   performed by a callback
//! - A [`Settle`] side channel letting an operation force success or a terminal failure
//!   from the content of a response
//! - `on_retry` / `on_rejected` / `on_resolved` notification hooks
//! - [`RateLimited`]: honours server "retry after" hints, with exponential backoff otherwise
//!
//! ## Usage Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//! use reattempt::{Delay, RetryOptions, retry_async};
//! use reattempt::strategy::Exponential;
//!
//! async fn example() -> Result<&'static str, &'static str> {
//!     let attempts = Arc::new(AtomicU32::new(0));
//!     retry_async(
//!         |_settle, _status| {
//!             let attempts = attempts.clone();
//!             async move {
//!                 if attempts.fetch_add(1, Ordering::SeqCst) < 1 {
//!                     Err("Error")
//!                 } else {
//!                     Ok("Success")
//!                 }
//!             }
//!         },
//!         RetryOptions::new()
//!             .with_retries(3)
//!             .with_delay(Delay::strategy(Exponential::from_millis(3)))
//!             .on_retry(|error, status| {
//!                 println!("attempt {} failed: {error}", status.count() + 1);
//!             }),
//!     )
//!     .await
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `random`: Enables randomized delay functionality (depends on rand)
//! - `serde`: (De)serialization of [`strategy::Backoff`] settings
//!
//! ## Logging
//!
//! Retry decisions are emitted as `tracing` events at `debug` level; hook panics at `warn`.
//! Installing a subscriber is left to the application.
pub mod error;
pub mod options;
pub mod policy;
pub mod status;
pub mod strategy;
pub mod unsync;

pub use error::ConfigError;
pub use options::{Delay, Retries, RetryOptions};
pub use policy::{RateLimited, RetryAfter};
pub use status::{AttemptError, RetryStatus, StatusHandle};
pub use unsync::{Settle, retry_async};
