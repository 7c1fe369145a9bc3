#[allow(clippy::module_inception)]
pub mod error;
pub mod executor;
pub mod task;

pub use error::ConfigError;
pub use executor::ExecutorError;
pub use task::{AggregateError, TaskError};
