use std::time::Duration;

use rand::Rng;

/// Retry and polling knobs of the score sync controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Attempts per cell write, the first one included.
    pub max_attempts: u32,
    /// Fixed pause between two attempts of the same write.
    pub retry_delay: Duration,
    /// Limit on every single store call.
    pub request_timeout: Duration,
    /// Lower bound of the polling interval used without a change feed.
    pub poll_interval_min: Duration,
    /// Upper bound of the polling interval used without a change feed.
    pub poll_interval_max: Duration,
    /// How long the `Saved` phase is shown before settling back to `Idle`.
    pub saved_linger: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(8),
            poll_interval_min: Duration::from_secs(15),
            poll_interval_max: Duration::from_secs(30),
            saved_linger: Duration::from_millis(1_500),
        }
    }
}

impl SyncPolicy {
    /// Next polling delay, drawn uniformly so that clients do not poll in lockstep.
    pub fn poll_interval(&self) -> Duration {
        let min = self.poll_interval_min.as_millis() as u64;
        let max = self.poll_interval_max.as_millis() as u64;
        if max <= min {
            return self.poll_interval_min;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_interval_stays_in_bounds() {
        let policy = SyncPolicy::default();
        for _ in 0..200 {
            let interval = policy.poll_interval();
            assert!(interval >= Duration::from_secs(15));
            assert!(interval <= Duration::from_secs(30));
        }
    }

    #[test]
    fn degenerate_range_uses_the_minimum() {
        let policy = SyncPolicy {
            poll_interval_min: Duration::from_secs(20),
            poll_interval_max: Duration::from_secs(10),
            ..SyncPolicy::default()
        };
        assert_eq!(policy.poll_interval(), Duration::from_secs(20));
    }
}
