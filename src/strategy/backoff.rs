use std::time::Duration;

use crate::error::ConfigError;
use crate::strategy::Exponential;

/// Capped exponential backoff keyed by the retry count.
///
/// The wait before retry `count` is `min × factor^count`, capped at `max`. With the
/// `random` feature and [`Backoff::with_randomize`] the uncapped wait is first multiplied
/// by a random factor in `[1, 2)`.
///
/// ```
/// use std::time::Duration;
/// use reattempt::strategy::Backoff;
///
/// let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30), 2.0).unwrap();
/// assert_eq!(backoff.delay_for(0), Duration::from_secs(1));
/// assert_eq!(backoff.delay_for(3), Duration::from_secs(8));
/// assert_eq!(backoff.delay_for(10), Duration::from_secs(30));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "BackoffConfig", into = "BackoffConfig")
)]
pub struct Backoff {
    pub(crate) min: Duration,
    pub(crate) max: Duration,
    pub(crate) factor: f64,
    #[cfg(feature = "random")]
    pub(crate) randomize: bool,
}

impl Default for Backoff {
    /// One second doubling up to thirty seconds.
    fn default() -> Self {
        Backoff {
            min: Duration::from_secs(1),
            max: Duration::from_secs(30),
            factor: 2.0,
            #[cfg(feature = "random")]
            randomize: false,
        }
    }
}

impl Backoff {
    /// Creates a backoff starting at `min`, growing by `factor` and capped at `max`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidFactor`] if `factor` is below `1.0` or not finite,
    /// [`ConfigError::MinExceedsMax`] if `min > max`.
    pub fn new(min: Duration, max: Duration, factor: f64) -> Result<Self, ConfigError> {
        if !factor.is_finite() || factor < 1.0 {
            return Err(ConfigError::InvalidFactor { factor });
        }
        if min > max {
            return Err(ConfigError::MinExceedsMax { min, max });
        }
        Ok(Backoff {
            min,
            max,
            factor,
            #[cfg(feature = "random")]
            randomize: false,
        })
    }

    /// Spreads waits out by a random factor in `[1, 2)`.
    #[cfg(feature = "random")]
    pub fn with_randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }

    /// Wait before the first retry.
    pub fn min(&self) -> Duration {
        self.min
    }

    /// Upper bound on any wait.
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Growth per retry.
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// The wait before the retry numbered `count`.
    pub fn delay_for(&self, count: u32) -> Duration {
        let exponent = count.min(i32::MAX as u32) as i32;
        let nanos = self.spread(self.min.as_nanos() as f64 * self.factor.powi(exponent));

        if !nanos.is_finite()
            || nanos < 0.0
            || nanos >= self.max.as_nanos() as f64
            || nanos >= u64::MAX as f64
        {
            return self.max;
        }
        Duration::from_nanos(nanos.round() as u64)
    }

    #[cfg(feature = "random")]
    fn spread(&self, nanos: f64) -> f64 {
        use rand::Rng;

        if self.randomize {
            nanos * rand::rng().random_range(1.0..2.0)
        } else {
            nanos
        }
    }

    #[cfg(not(feature = "random"))]
    fn spread(&self, nanos: f64) -> f64 {
        nanos
    }
}

impl IntoIterator for Backoff {
    type Item = Duration;
    type IntoIter = Exponential;

    fn into_iter(self) -> Exponential {
        Exponential::from(self)
    }
}

/// Serialized form of [`Backoff`], validated on the way in.
#[cfg(feature = "serde")]
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
struct BackoffConfig {
    min_ms: u64,
    max_ms: u64,
    factor: f64,
    #[cfg(feature = "random")]
    #[serde(default)]
    randomize: bool,
}

#[cfg(feature = "serde")]
impl TryFrom<BackoffConfig> for Backoff {
    type Error = ConfigError;

    fn try_from(config: BackoffConfig) -> Result<Self, ConfigError> {
        let backoff = Backoff::new(
            Duration::from_millis(config.min_ms),
            Duration::from_millis(config.max_ms),
            config.factor,
        )?;
        #[cfg(feature = "random")]
        let backoff = backoff.with_randomize(config.randomize);
        Ok(backoff)
    }
}

#[cfg(feature = "serde")]
impl From<Backoff> for BackoffConfig {
    fn from(backoff: Backoff) -> Self {
        // An uncapped backoff (`Duration::MAX`) saturates to the largest representable cap.
        BackoffConfig {
            min_ms: u64::try_from(backoff.min.as_millis()).unwrap_or(u64::MAX),
            max_ms: u64::try_from(backoff.max.as_millis()).unwrap_or(u64::MAX),
            factor: backoff.factor,
            #[cfg(feature = "random")]
            randomize: backoff.randomize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_then_caps() {
        let backoff = Backoff::default();
        let waits: Vec<u64> = (0..7)
            .map(|count| backoff.delay_for(count).as_millis() as u64)
            .collect();
        assert_eq!(waits, vec![1000, 2000, 4000, 8000, 16000, 30000, 30000]);
    }

    #[test]
    fn constant_factor() {
        let backoff =
            Backoff::new(Duration::from_millis(500), Duration::from_secs(30), 1.0).unwrap();
        for count in 0..10 {
            assert_eq!(backoff.delay_for(count), Duration::from_millis(500));
        }
    }

    #[test]
    fn huge_count_clamps_to_max() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn rejects_bad_configuration() {
        assert_eq!(
            Backoff::new(Duration::from_secs(1), Duration::from_secs(2), 0.5),
            Err(ConfigError::InvalidFactor { factor: 0.5 })
        );
        assert!(matches!(
            Backoff::new(Duration::from_secs(1), Duration::from_secs(2), f64::NAN),
            Err(ConfigError::InvalidFactor { .. })
        ));
        assert_eq!(
            Backoff::new(Duration::from_secs(3), Duration::from_secs(2), 2.0),
            Err(ConfigError::MinExceedsMax {
                min: Duration::from_secs(3),
                max: Duration::from_secs(2),
            })
        );
    }

    #[test]
    fn iterates_from_first_retry() {
        let waits: Vec<Duration> = Backoff::default().into_iter().take(3).collect();
        assert_eq!(
            waits,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_round_trips_through_json() {
        let backoff =
            Backoff::new(Duration::from_millis(250), Duration::from_secs(10), 1.5).unwrap();
        let json = serde_json::to_value(backoff).unwrap();
        assert_eq!(json["min_ms"], 250);
        assert_eq!(json["max_ms"], 10_000);
        assert_eq!(json["factor"], 1.5);

        let restored: Backoff = serde_json::from_value(json).unwrap();
        assert_eq!(restored, backoff);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_is_validated_on_deserialize() {
        let err = serde_json::from_str::<Backoff>(r#"{"min_ms":100,"max_ms":1000,"factor":0.5}"#)
            .unwrap_err();
        assert!(
            err.to_string()
                .contains("backoff factor must be a finite number >= 1.0, got 0.5"),
            "{err}"
        );

        let err = serde_json::from_str::<Backoff>(r#"{"min_ms":3000,"max_ms":1000,"factor":2.0}"#)
            .unwrap_err();
        assert!(
            err.to_string()
                .contains("backoff minimum 3s exceeds maximum 1s"),
            "{err}"
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn uncapped_config_saturates() {
        let backoff = Backoff::new(Duration::from_secs(1), Duration::MAX, 2.0).unwrap();
        let json = serde_json::to_value(backoff).unwrap();
        assert_eq!(json["max_ms"], u64::MAX);

        let restored: Backoff = serde_json::from_value(json).unwrap();
        assert_eq!(restored.max(), Duration::from_millis(u64::MAX));
        assert_eq!(restored.delay_for(3), Duration::from_secs(8));
    }

    #[cfg(feature = "random")]
    #[test]
    fn randomized_waits_stay_within_bounds() {
        let backoff = Backoff::default().with_randomize(true);
        for count in 0..8 {
            let wait = backoff.delay_for(count);
            let base = Backoff::default().delay_for(count);
            assert!(wait >= base, "count {count}: {wait:?} < {base:?}");
            assert!(wait <= Duration::from_secs(30));
        }
    }
}
