//! Retry delay after consecutive transient failures

use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_EXPONENT: u32 = 4;
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(80);

/// `delay = min(base * 2^min(failures, max_exponent), max_delay)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Normal polling interval
    pub base: Duration,
    pub max_exponent: u32,
    pub max_delay: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max_exponent: u32, max_delay: Duration) -> Self {
        Self {
            base,
            max_exponent,
            max_delay: max_delay.max(base),
        }
    }

    /// Delay before the next tick; zero failures gives the base interval
    pub fn delay_for(&self, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.min(self.max_exponent).min(31);
        let factor = 1u32 << exponent;
        self.base
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_EXPONENT, DEFAULT_MAX_DELAY)
    }
}
