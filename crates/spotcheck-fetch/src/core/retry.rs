use std::time::Duration;

/// Delay before retry number `retry_count` (0 = first retry): `base * 2^retry_count`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use spotcheck_fetch::core::retry_delay;
///
/// assert_eq!(retry_delay(0, Duration::from_millis(100)), Duration::from_millis(100));
/// assert_eq!(retry_delay(2, Duration::from_millis(100)), Duration::from_millis(400));
/// ```
pub fn retry_delay(retry_count: u32, base: Duration) -> Duration {
    let multiplier = 2_u32.saturating_pow(retry_count);
    base.saturating_mul(multiplier)
}

/// Bounded exponential backoff: a fixed number of attempts with a doubling
/// delay between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub min_delay:    Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_delay:    Duration::from_secs(1),
        }
    }
}

impl Backoff {
    pub fn new(max_attempts: u32, min_delay: Duration) -> Self {
        Self {
            max_attempts,
            min_delay,
        }
    }

    /// Delay to wait after failed attempt `attempt` (0-indexed), or `None`
    /// when no attempts remain.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        (attempt + 1 < self.max_attempts).then(|| retry_delay(attempt, self.min_delay))
    }
}
