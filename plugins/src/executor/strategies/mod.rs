pub mod concurrency;
pub mod retry;

pub use concurrency::{AdaptiveConcurrencyPlugin, ConcurrencyConfig, FixedConcurrencyPlugin};
pub use retry::{ExponentialBackoffPlugin, LinearRetryPlugin, RetryConfig};
