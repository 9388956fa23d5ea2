//! Retry policy for remote commands.
//!
//! A policy is a number of retries and a fixed interval: a command that keeps
//! failing runs `retries + 1` times with `interval` between attempts.

use std::time::Duration;

/// Default wait between attempts.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Default retries for a plain `execute`.
pub const DEFAULT_RETRIES: u32 = 1;

/// Default retries for `pip install`.
pub const DEFAULT_INSTALL_RETRIES: u32 = 15;

/// Linear retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Wait between a failed attempt and the next one.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RETRIES, DEFAULT_INTERVAL)
    }
}

impl RetryPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn fixed(retries: u32, interval: Duration) -> Self {
        Self { retries, interval }
    }

    /// A single attempt, no retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::fixed(0, DEFAULT_INTERVAL)
    }

    /// The policy `install` uses unless told otherwise.
    #[must_use]
    pub const fn install() -> Self {
        Self::fixed(DEFAULT_INSTALL_RETRIES, DEFAULT_INTERVAL)
    }

    /// Set retries.
    #[must_use]
    pub const fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set interval.
    #[must_use]
    pub const fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Total attempts allowed.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay before the attempt following `completed` failed attempts, if any.
    #[must_use]
    pub const fn delay_after(&self, completed: u32) -> Option<Duration> {
        if completed < self.max_attempts() {
            Some(self.interval)
        } else {
            None
        }
    }
}

/// Retry state tracker.
#[derive(Debug)]
pub struct RetryState {
    /// Attempts made so far.
    attempts: u32,
    /// Policy in use.
    policy: RetryPolicy,
    /// Total delay accumulated.
    total_delay: Duration,
}

impl RetryState {
    /// Create new state.
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            attempts: 0,
            policy,
            total_delay: Duration::ZERO,
        }
    }

    /// Attempts made so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record an attempt.
    pub const fn record_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    /// Delay before the next attempt, or `None` once the budget is spent.
    ///
    /// Returning a delay counts it towards [`total_delay`](Self::total_delay).
    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = self.policy.delay_after(self.attempts)?;
        self.total_delay += delay;
        Some(delay)
    }

    /// Get total delay so far.
    #[must_use]
    pub const fn total_delay(&self) -> Duration {
        self.total_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn defaults() {
        assert_eq!(RetryPolicy::default(), RetryPolicy::fixed(1, Duration::from_secs(10)));
        assert_eq!(RetryPolicy::install().retries, 15);
        assert_eq!(RetryPolicy::none().max_attempts(), 1);
    }

    #[test]
    fn builder_setters() {
        let policy = RetryPolicy::none()
            .retries(3)
            .interval(Duration::from_millis(250));
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.interval, Duration::from_millis(250));
    }

    #[test]
    fn max_attempts_saturates() {
        assert_eq!(RetryPolicy::fixed(u32::MAX, DEFAULT_INTERVAL).max_attempts(), u32::MAX);
    }

    #[test]
    fn retry_state() {
        let mut state = RetryState::new(RetryPolicy::fixed(2, Duration::from_secs(1)));

        state.record_attempt();
        assert_eq!(state.next_delay(), Some(Duration::from_secs(1)));
        state.record_attempt();
        assert_eq!(state.next_delay(), Some(Duration::from_secs(1)));
        state.record_attempt();
        assert_eq!(state.next_delay(), None);

        assert_eq!(state.attempts(), 3);
        assert_eq!(state.total_delay(), Duration::from_secs(2));
    }

    proptest! {
        #[test]
        fn always_failing_runs_retries_plus_one(retries in 0u32..64, secs in 0u64..30) {
            let interval = Duration::from_secs(secs);
            let mut state = RetryState::new(RetryPolicy::fixed(retries, interval));
            let mut sleeps = 0u32;
            loop {
                state.record_attempt();
                match state.next_delay() {
                    Some(_) => sleeps += 1,
                    None => break,
                }
            }
            prop_assert_eq!(state.attempts(), retries + 1);
            prop_assert_eq!(sleeps, retries);
            prop_assert_eq!(state.total_delay(), interval * retries);
        }
    }
}
