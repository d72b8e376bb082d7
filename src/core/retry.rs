use std::time::Duration;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_BACKOFF_FACTOR: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    backoff_factor: u32,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_delay: base_delay,
        }
    }

    pub fn with_backoff(mut self, factor: u32, max_delay: Duration) -> Self {
        self.backoff_factor = factor;
        self.max_delay = max_delay.max(self.base_delay);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after the given 1-based attempt failed, or `None` when
    /// that attempt was the last one allowed.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }

        let factor = self.backoff_factor.saturating_pow(attempt - 1);
        let delay_ms = (self.base_delay.as_millis() as u64).saturating_mul(factor as u64);

        Some(Duration::from_millis(delay_ms).min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_DELAY)
    }
}
