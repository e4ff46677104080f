use std::time::Duration;
use reqwest::StatusCode;

/// Status codes treated as transient: request timeout, too many requests,
/// bad gateway, service unavailable, gateway timeout.
pub const RETRYABLE_STATUS_CODES: [u16; 5] = [408, 429, 502, 503, 504];

/// Bounded retry with linearly increasing delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one
    pub retry_count: u32,
    /// Delay before the first retry; the n-th retry waits `n * retry_delay`
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(retry_count: u32, retry_delay: Duration) -> Self {
        Self { retry_count, retry_delay }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn is_retryable(status: StatusCode) -> bool {
        RETRYABLE_STATUS_CODES.contains(&status.as_u16())
    }

    /// Whether another attempt is allowed after `retries_done` retries
    pub fn should_retry(&self, status: StatusCode, retries_done: u32) -> bool {
        Self::is_retryable(status) && retries_done < self.retry_count
    }

    /// Delay before retry number `retry` (1-indexed)
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.retry_delay.saturating_mul(retry)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(1))
    }
}
