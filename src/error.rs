//! Errors raised by the crate itself.
//!
//! Failures of the retried operation are never wrapped: [`retry_async`](crate::retry_async)
//! hands the caller's own error type back unchanged. The types here only cover policy
//! configuration the crate refuses to build.
use std::time::Duration;

use thiserror::Error;

/// A delay policy was configured with values that cannot produce sensible waits.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The growth factor is below `1.0` or not a finite number.
    #[error("backoff factor must be a finite number >= 1.0, got {factor}")]
    InvalidFactor {
        /// The rejected factor.
        factor: f64,
    },
    /// The initial delay is larger than the cap.
    #[error("backoff minimum {min:?} exceeds maximum {max:?}")]
    MinExceedsMax {
        /// Configured initial delay.
        min: Duration,
        /// Configured cap.
        max: Duration,
    },
}

impl ConfigError {
    /// Returns a short stable label for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::InvalidFactor { .. } => "backoff_invalid_factor",
            ConfigError::MinExceedsMax { .. } => "backoff_min_exceeds_max",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_and_labels() {
        let err = ConfigError::InvalidFactor { factor: 0.5 };
        assert_eq!(
            err.to_string(),
            "backoff factor must be a finite number >= 1.0, got 0.5"
        );
        assert_eq!(err.as_label(), "backoff_invalid_factor");

        let err = ConfigError::MinExceedsMax {
            min: Duration::from_secs(2),
            max: Duration::from_secs(1),
        };
        assert_eq!(err.to_string(), "backoff minimum 2s exceeds maximum 1s");
        assert_eq!(err.as_label(), "backoff_min_exceeds_max");
    }
}
