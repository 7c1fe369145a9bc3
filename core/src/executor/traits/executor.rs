use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::executor::cache::ReadCache;
use crate::executor::types::{Task, TaskOutput};

/// Per-attempt context handed to a task executor.
#[derive(Clone)]
pub struct ExecutionContext {
    pub run_id: String,
    pub wave: usize,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Outputs of completed dependencies, already bounded.
    pub dependency_context: String,
    pub read_cache: Arc<ReadCache>,
}

/// Runs one attempt of one task.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &Task, ctx: &ExecutionContext) -> Result<TaskOutput, TaskError>;
}
