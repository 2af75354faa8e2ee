//! Backoff policy for rate-limited API calls.

use std::time::Duration;

/// Exponential backoff with a cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Also retry 5xx responses. Off by default: writes are not idempotent.
    pub retry_server_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            retry_server_errors: false,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[cfg(test)]
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            retry_server_errors: false,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    ///
    /// A server-provided `Retry-After` wins when it is longer than the
    /// computed backoff.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let backoff = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        retry_after.map_or(backoff, |after| after.max(backoff))
    }

    /// Whether a response with `status` should be retried after `attempt` retries.
    #[must_use]
    pub fn should_retry(&self, status: u16, attempt: u32) -> bool {
        if attempt >= self.max_retries {
            return false;
        }
        status == 429 || (self.retry_server_errors && (500..600).contains(&status))
    }
}

/// Parse a `Retry-After` header given in seconds.
///
/// HTTP-date values are not supported and yield `None`.
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0, None), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1, None), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4, None), Duration::from_secs(16));
        assert_eq!(policy.delay_for(5, None), Duration::from_secs(30));
        assert_eq!(policy.delay_for(40, None), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_after_only_lengthens() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for(0, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
        assert_eq!(
            policy.delay_for(3, Some(Duration::from_secs(1))),
            Duration::from_secs(8)
        );
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(429, 0));
        assert!(policy.should_retry(429, 2));
        assert!(!policy.should_retry(429, 3));
        assert!(!policy.should_retry(503, 0));
        assert!(!policy.should_retry(400, 0));

        let eager = RetryPolicy {
            retry_server_errors: true,
            ..RetryPolicy::default()
        };
        assert!(eager.should_retry(503, 0));
        assert!(!RetryPolicy::none().should_retry(429, 0));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(" 12 "), Some(Duration::from_secs(12)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
