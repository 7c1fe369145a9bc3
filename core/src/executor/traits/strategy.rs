use std::time::Duration;

use crate::error::TaskError;

/// Retry policy applied around a single task attempt.
pub trait RetryStrategyPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Delay before the retry that follows `attempt` failed attempts minus one
    /// (0 for the first retry). `None` stops retrying.
    fn next_delay(&self, attempt: u32, error: &TaskError) -> Option<Duration>;

    /// Total attempts allowed, including the first.
    fn max_attempts(&self) -> u32;

    fn should_retry(&self, attempt: u32, error: &TaskError) -> bool {
        attempt < self.max_attempts() && !self.is_fatal_error(error)
    }

    fn is_fatal_error(&self, error: &TaskError) -> bool {
        !error.is_retryable()
    }
}

/// Concurrency ceiling chosen per wave.
pub trait ConcurrencyStrategyPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn calculate_concurrency(&self, context: &ConcurrencyContext) -> usize;
}

#[derive(Debug, Clone)]
pub struct ConcurrencyContext {
    /// Ceiling of the configured preset (conservative or aggressive).
    pub base_concurrency: usize,
    /// Number of tasks in the wave about to run.
    pub wave_size: usize,
}
