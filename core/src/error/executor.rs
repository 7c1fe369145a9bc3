use thiserror::Error;

use super::error::ConfigError;
use crate::executor::types::TaskId;

/// Graph- and configuration-level errors. Per-task failures never surface
/// here; they are folded into `ExecutionResult`s.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Duplicate task ID: {0}")]
    DuplicateTaskId(TaskId),

    #[error("Unresolved dependencies: {0}")]
    UnresolvedDependencies(String),

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Iteration limit of {0} reached before all tasks resolved")]
    IterationLimit(usize),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
