// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

//! Backoff policy for reconnecting to the relay.

use std::time::Duration;

use rand::Rng;

#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Attempts before giving up. Zero disables reconnecting.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Adds up to 100 ms of random delay to every wait.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Exponential delay before the given attempt, counting from 1.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.initial_delay.saturating_mul(factor).min(self.max_delay);

        if self.jitter {
            delay + Duration::from_millis(rand::thread_rng().gen_range(0..100))
        } else {
            delay
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delay_is_capped() {
        let policy = RetryPolicy::default()
            .with_delay(Duration::from_secs(1))
            .with_jitter(false);

        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(20), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_small() {
        let policy = RetryPolicy::default().with_delay(Duration::from_millis(10));

        for _ in 0..50 {
            let delay = policy.delay_for_attempt(1);
            assert!(delay >= Duration::from_millis(10) && delay < Duration::from_millis(110));
        }
    }
}
