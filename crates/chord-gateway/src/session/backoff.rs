//! Reconnect backoff
//!
//! Exponential growth from `min` towards `max` with jitter on the growth part
//! only. The first delay after a reset is exactly `min`, later delays never
//! shrink and never exceed `max`.

use chord_common::ReconnectConfig;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    factor: f64,
    attempt: u32,
    previous: Duration,
}

impl Backoff {
    #[must_use]
    pub fn new(min: Duration, max: Duration, factor: f64) -> Self {
        let factor = if factor.is_finite() && factor >= 1.0 {
            factor
        } else {
            2.0
        };
        Self {
            min,
            max: max.max(min),
            factor,
            attempt: 0,
            previous: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self::new(config.min_delay(), config.max_delay(), config.factor)
    }

    /// Delay before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);

        let exponent = i32::try_from(self.attempt - 1).unwrap_or(i32::MAX);
        let raw = self.min.as_secs_f64() * self.factor.powi(exponent);
        let raw = Duration::from_secs_f64(raw.min(self.max.as_secs_f64()));

        let growth = raw.saturating_sub(self.min);
        let jitter: f64 = rand::thread_rng().gen_range(0.5..=1.0);
        let delay = (self.min + growth.mul_f64(jitter)).max(self.previous).min(self.max);

        self.previous = delay;
        delay
    }

    /// Back to the first delay; called once a connection is established
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.previous = Duration::ZERO;
    }

    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&ReconnectConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_delay_is_min() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60), 2.0);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_delays_never_shrink_and_stay_capped() {
        for _ in 0..20 {
            let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60), 2.0);
            let mut previous = Duration::ZERO;
            for _ in 0..30 {
                let delay = backoff.next_delay();
                assert!(delay >= previous);
                assert!(delay <= Duration::from_secs(60));
                previous = delay;
            }
            assert!(previous >= Duration::from_secs(30));
        }
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(10), 2.0);
        for _ in 0..5 {
            backoff.next_delay();
        }
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_bad_factor_falls_back() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(8), f64::NAN);
        backoff.next_delay();
        let second = backoff.next_delay();
        assert!(second >= Duration::from_millis(1500));
        assert!(second <= Duration::from_secs(2));
    }
}
