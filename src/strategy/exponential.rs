use std::time::Duration;

use crate::strategy::Backoff;

/// Each retry increases the delay since the last exponentially, up to an optional cap.
///
/// The iterator form of [`Backoff`]: the `n`-th item is `Backoff::delay_for(n)`.
#[derive(Debug, Clone)]
pub struct Exponential {
    backoff: Backoff,
    step: u32,
}

impl Exponential {
    /// Create a new [`Exponential`] using the given millisecond duration as the initial delay and
    /// an exponential backoff factor of `2.0`.
    pub fn from_millis(base: u64) -> Self {
        Self::from_millis_with_factor(base, 2.0)
    }

    /// Create a new [`Exponential`] using the given millisecond duration as the initial delay and
    /// the given exponential backoff factor.
    ///
    /// Factors below `1.0`, and NaN, are treated as `1.0`: delays never shrink.
    pub fn from_millis_with_factor(base: u64, factor: f64) -> Self {
        Exponential {
            backoff: Backoff {
                min: Duration::from_millis(base),
                max: Duration::MAX,
                factor: if factor >= 1.0 { factor } else { 1.0 },
                #[cfg(feature = "random")]
                randomize: false,
            },
            step: 0,
        }
    }

    /// Caps every delay at `max`.
    pub fn max_delay(mut self, max: Duration) -> Self {
        self.backoff.max = max;
        self
    }
}

impl Iterator for Exponential {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let duration = self.backoff.delay_for(self.step);
        self.step = self.step.saturating_add(1);
        Some(duration)
    }
}

impl From<Duration> for Exponential {
    fn from(duration: Duration) -> Self {
        Self::from_millis(duration.as_millis() as u64)
    }
}

impl From<Backoff> for Exponential {
    fn from(backoff: Backoff) -> Self {
        Exponential { backoff, step: 0 }
    }
}

#[test]
fn exponential_with_factor() {
    let mut iter = Exponential::from_millis_with_factor(1000, 2.0);
    assert_eq!(iter.next(), Some(Duration::from_millis(1000)));
    assert_eq!(iter.next(), Some(Duration::from_millis(2000)));
    assert_eq!(iter.next(), Some(Duration::from_millis(4000)));
    assert_eq!(iter.next(), Some(Duration::from_millis(8000)));
    assert_eq!(iter.next(), Some(Duration::from_millis(16000)));
    assert_eq!(iter.next(), Some(Duration::from_millis(32000)));
}

#[test]
fn exponential_capped() {
    let waits: Vec<Duration> = Exponential::from_millis(1000)
        .max_delay(Duration::from_secs(5))
        .take(5)
        .collect();
    assert_eq!(
        waits,
        [1, 2, 4, 5, 5].map(Duration::from_secs).to_vec()
    );
}

#[test]
fn exponential_overflow() {
    let mut iter = Exponential::from_millis_with_factor(1000, f64::MAX);
    assert_eq!(iter.next(), Some(Duration::from_millis(1000)));
    assert_eq!(iter.next(), Some(Duration::MAX));
    assert_eq!(iter.next(), Some(Duration::MAX));
}

#[test]
fn exponential_negative_factor_holds_base() {
    let waits: Vec<Duration> = Exponential::from_millis_with_factor(100, -2.0).take(3).collect();
    assert_eq!(waits, [100, 100, 100].map(Duration::from_millis).to_vec());

    let waits: Vec<Duration> = Exponential::from_millis_with_factor(100, f64::NAN).take(2).collect();
    assert_eq!(waits, [100, 100].map(Duration::from_millis).to_vec());
}
