use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;

/// Each retry uses a duration picked at random from a range of milliseconds.
#[derive(Debug, Clone)]
pub struct Range {
    millis: RangeInclusive<u64>,
}

impl Range {
    /// Waits between `min` and `max` milliseconds, `max` excluded.
    ///
    /// An empty range always yields `min`.
    pub fn from_millis_exclusive(min: u64, max: u64) -> Self {
        Range {
            millis: min..=max.saturating_sub(1).max(min),
        }
    }

    /// Waits between `min` and `max` milliseconds, both included.
    ///
    /// An inverted range always yields `min`.
    pub fn from_millis_inclusive(min: u64, max: u64) -> Self {
        Range {
            millis: min..=max.max(min),
        }
    }
}

impl Iterator for Range {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(Duration::from_millis(
            rand::rng().random_range(self.millis.clone()),
        ))
    }
}

/// Scales `duration` by a random factor in `[0, 1)`.
///
/// ```
/// use std::time::Duration;
/// use reattempt::strategy::{Exponential, jitter};
///
/// let waits = Exponential::from_millis(100).map(jitter).take(3);
/// assert!(waits.zip([100, 200, 400]).all(|(wait, cap)| wait < Duration::from_millis(cap)));
/// ```
pub fn jitter(duration: Duration) -> Duration {
    duration.mul_f64(rand::random::<f64>())
}

#[test]
fn range_stays_within_bounds() {
    let exclusive = Range::from_millis_exclusive(10, 20);
    assert!(
        exclusive
            .take(100)
            .all(|d| d >= Duration::from_millis(10) && d < Duration::from_millis(20))
    );

    let inclusive = Range::from_millis_inclusive(10, 20);
    assert!(
        inclusive
            .take(100)
            .all(|d| d >= Duration::from_millis(10) && d <= Duration::from_millis(20))
    );
}

#[test]
fn degenerate_ranges_yield_min() {
    let mut empty = Range::from_millis_exclusive(5, 5);
    assert_eq!(empty.next(), Some(Duration::from_millis(5)));

    let mut inverted = Range::from_millis_inclusive(9, 3);
    assert_eq!(inverted.next(), Some(Duration::from_millis(9)));
}

#[test]
fn jitter_never_exceeds_input() {
    for _ in 0..100 {
        assert!(jitter(Duration::from_millis(100)) < Duration::from_millis(100));
    }
    assert_eq!(jitter(Duration::ZERO), Duration::ZERO);
}
