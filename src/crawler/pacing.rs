//! Pacing Policy
//!
//! Delays are computed, not slept: the coordinator asks the pacer how long to
//! wait and performs the wait itself, so tests can swap in a fixed pacer and
//! never touch the wall clock.

use crate::config::PacingConfig;
use rand::Rng;
use std::time::Duration;

pub trait Pacer: Send + Sync {
    /// Delay before a first attempt
    fn next_delay(&self) -> Duration;

    /// Delay before retry number `attempt` (1-based)
    fn retry_delay(&self, attempt: u32) -> Duration;
}

/// Uniformly random delays drawn from a `[min, max]` window
#[derive(Debug, Clone)]
pub struct PacingPolicy {
    min: Duration,
    max: Duration,
    max_backoff: Duration,
}

impl PacingPolicy {
    /// Creates a policy; `min` and `max` are swapped if given out of order
    pub fn new(min: Duration, max: Duration, max_backoff: Duration) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            max,
            max_backoff: max_backoff.max(max),
        }
    }

    pub fn from_config(config: &PacingConfig) -> Self {
        Self::new(
            Duration::from_millis(config.min_ms),
            Duration::from_millis(config.max_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    pub fn window(&self) -> (Duration, Duration) {
        (self.min, self.max)
    }

    fn draw(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

impl Pacer for PacingPolicy {
    fn next_delay(&self) -> Duration {
        self.draw()
    }

    /// The window draw doubled for every earlier retry, capped at the backoff limit
    fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.draw()
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Constant delay, for tests and unpaced runs
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPacer {
    delay: Duration,
}

impl FixedPacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

impl Pacer for FixedPacer {
    fn next_delay(&self) -> Duration {
        self.delay
    }

    fn retry_delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}
