use std::time::Duration;

use hive_core::api::{RetryStrategyPlugin, SchedulerConfig, TaskError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryConfig {
    pub fn from_scheduler(cfg: &SchedulerConfig) -> Self {
        Self {
            max_attempts: cfg.max_retries.saturating_add(1),
            base_delay_ms: cfg.retry_base_delay_ms,
            max_delay_ms: cfg.retry_max_delay_ms,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based), or `None` once the
    /// attempt budget is spent. `scale` maps the attempt to a multiple of the
    /// base delay.
    fn delay(&self, attempt: u32, scale: impl FnOnce(u32) -> u64) -> Option<Duration> {
        (attempt < self.max_attempts).then(|| {
            Duration::from_millis(
                self.base_delay_ms
                    .saturating_mul(scale(attempt))
                    .min(self.max_delay_ms),
            )
        })
    }
}

/// Doubles the delay on every failed attempt.
pub struct ExponentialBackoffPlugin(RetryConfig);

/// Grows the delay by one base step per failed attempt.
pub struct LinearRetryPlugin(RetryConfig);

impl ExponentialBackoffPlugin {
    pub fn new(config: RetryConfig) -> Self {
        Self(config)
    }
}

impl LinearRetryPlugin {
    pub fn new(config: RetryConfig) -> Self {
        Self(config)
    }
}

impl RetryStrategyPlugin for ExponentialBackoffPlugin {
    fn name(&self) -> &str {
        "exponential-backoff"
    }

    fn next_delay(&self, attempt: u32, _error: &TaskError) -> Option<Duration> {
        self.0.delay(attempt, |n| 1u64 << n.min(30))
    }

    fn max_attempts(&self) -> u32 {
        self.0.max_attempts
    }
}

impl RetryStrategyPlugin for LinearRetryPlugin {
    fn name(&self) -> &str {
        "linear"
    }

    fn next_delay(&self, attempt: u32, _error: &TaskError) -> Option<Duration> {
        self.0.delay(attempt, |n| u64::from(n) + 1)
    }

    fn max_attempts(&self) -> u32 {
        self.0.max_attempts
    }
}
