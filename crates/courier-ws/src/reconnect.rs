//! Feed retry policy
//!
//! While an order runs on simulated positions the manager keeps a single
//! retry pending. Each failed attempt stretches the wait by `multiplier`
//! up to `max_delay`; a live feed resets the count.
//!
//! ```
//! use courier_ws::ReconnectConfig;
//! use std::time::Duration;
//!
//! let policy = ReconnectConfig::default().with_jitter(0.0);
//! let waits: Vec<_> = (1..=3).filter_map(|n| policy.next_delay(n)).collect();
//! assert_eq!(
//!     waits,
//!     [Duration::from_secs(3), Duration::from_secs(6), Duration::from_secs(12)]
//! );
//! ```

use rand::Rng;
use std::time::Duration;

/// Backoff between live feed attempts
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Wait before the first retry
    pub initial_delay: Duration,
    /// Longest wait between retries
    pub max_delay: Duration,
    /// Growth per failed attempt
    pub multiplier: f64,
    /// Random spread as a fraction of the wait, 0-1
    pub jitter: f64,
    /// Retries allowed per outage (None = until the order finishes)
    pub attempt_limit: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
            attempt_limit: None,
        }
    }
}

impl ReconnectConfig {
    /// Default policy: 3 s doubling to 30 s, ±10% spread, no limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy that never retries; a failed feed stays on simulation
    pub fn disabled() -> Self {
        Self {
            attempt_limit: Some(0),
            ..Default::default()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set the spread; clamped to 0-1
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn with_attempt_limit(mut self, limit: u32) -> Self {
        self.attempt_limit = Some(limit);
        self
    }

    /// Whether retry number `attempt` (from 1) is allowed
    pub fn should_reconnect(&self, attempt: u32) -> bool {
        self.attempt_limit.map_or(true, |limit| attempt <= limit)
    }

    /// Wait before retry number `attempt`, without spread
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let growth = self.multiplier.powi(attempt.saturating_sub(1).min(63) as i32);
        Duration::try_from_secs_f64(self.initial_delay.as_secs_f64() * growth)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Wait before retry number `attempt`, or `None` once retries run out
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }
        let base = self.base_delay(attempt);
        if self.jitter == 0.0 {
            return Some(base);
        }
        let spread = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        Some(base.mul_f64(1.0 + spread))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = ReconnectConfig::default();
        assert_eq!(policy.initial_delay, Duration::from_secs(3));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert!(policy.attempt_limit.is_none());
    }

    #[test]
    fn test_growth_is_capped() {
        let policy = ReconnectConfig::new().with_jitter(0.0);
        assert_eq!(policy.base_delay(4), Duration::from_secs(24));
        assert_eq!(policy.base_delay(5), Duration::from_secs(30));
        assert_eq!(policy.base_delay(500), Duration::from_secs(30));
        assert_eq!(policy.next_delay(9), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_spread_bounds() {
        let policy = ReconnectConfig::new();
        for _ in 0..100 {
            let wait = policy.next_delay(1).unwrap();
            assert!(wait >= Duration::from_millis(2700));
            assert!(wait <= Duration::from_millis(3300));
        }
    }

    #[test]
    fn test_attempt_limit() {
        assert!(ReconnectConfig::default().should_reconnect(1000));

        let limited = ReconnectConfig::default().with_attempt_limit(2);
        assert!(limited.next_delay(2).is_some());
        assert!(limited.next_delay(3).is_none());

        assert!(ReconnectConfig::disabled().next_delay(1).is_none());
    }
}
