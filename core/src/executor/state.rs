use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::cache::ReadCache;
use super::context::ContextPropagator;
use super::types::{ExecutionResult, RunStatus, TaskId};

/// Mutable bookkeeping of one `process()` call. Created when the run starts
/// and dropped when it returns.
pub struct RunState {
    run_id: String,
    completed: HashSet<TaskId>,
    results: HashMap<TaskId, ExecutionResult>,
    context: ContextPropagator,
    read_cache: Arc<ReadCache>,
}

impl RunState {
    pub fn new(run_id: impl Into<String>, context: ContextPropagator, read_cache: ReadCache) -> Self {
        Self {
            run_id: run_id.into(),
            completed: HashSet::new(),
            results: HashMap::new(),
            context,
            read_cache: Arc::new(read_cache),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn completed(&self) -> &HashSet<TaskId> {
        &self.completed
    }

    pub fn read_cache(&self) -> Arc<ReadCache> {
        self.read_cache.clone()
    }

    pub fn dependency_context(&self, dependencies: &[TaskId]) -> String {
        self.context.build(dependencies)
    }

    /// Record a task's final result. Only successful results feed the
    /// context propagator.
    pub fn record(&mut self, result: ExecutionResult) {
        self.completed.insert(result.task_id);
        if result.success {
            if let Some(primary) = result.primary_output() {
                self.context.record(result.task_id, primary);
            }
        }
        self.results.insert(result.task_id, result);
    }

    pub fn result(&self, task_id: TaskId) -> Option<&ExecutionResult> {
        self.results.get(&task_id)
    }

    pub fn take_result(&mut self, task_id: TaskId) -> Option<ExecutionResult> {
        self.results.remove(&task_id)
    }

    pub fn status(&self, total: usize) -> RunStatus {
        RunStatus {
            completed: self.results.len(),
            total,
            failed: self.results.values().filter(|r| !r.success).count(),
        }
    }
}
