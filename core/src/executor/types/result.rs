use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AggregateError, TaskError};

use super::task::TaskId;

/// Final disposition of a single task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub task_id: TaskId,

    pub success: bool,

    /// Opaque payload (tool output, file listing, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,

    /// Human-readable log lines. The first entry holds the primary output.
    #[serde(default)]
    pub logs: Vec<String>,

    /// Attempts consumed, including the successful one.
    #[serde(default)]
    pub attempts: u32,

    #[serde(default)]
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn succeeded(task_id: TaskId, output: TaskOutput) -> Self {
        Self {
            task_id,
            success: true,
            output: output.payload,
            error: None,
            logs: output.logs,
            attempts: 1,
            duration_ms: 0,
        }
    }

    pub fn failed(task_id: TaskId, error: TaskError) -> Self {
        Self {
            task_id,
            success: false,
            output: None,
            logs: vec![error.to_string()],
            error: Some(error),
            attempts: 1,
            duration_ms: 0,
        }
    }

    /// Primary output used for context propagation.
    pub fn primary_output(&self) -> Option<&str> {
        self.logs.first().map(String::as_str)
    }
}

/// What a task executor hands back for a successful attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskOutput {
    pub payload: Option<Value>,
    pub logs: Vec<String>,
}

impl TaskOutput {
    pub fn text(primary: impl Into<String>) -> Self {
        Self {
            payload: None,
            logs: vec![primary.into()],
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn push_log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }
}

/// Progress counters of the current or most recent run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStatus {
    pub completed: usize,
    pub total: usize,
    pub failed: usize,
}

/// Everything one `process()` call produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,

    /// One result per input task, in input order.
    pub results: Vec<ExecutionResult>,

    /// Task ids per executed wave.
    pub waves: Vec<Vec<TaskId>>,

    pub duration_ms: u64,

    /// Present when at least one task failed.
    pub aggregate_error: Option<AggregateError>,
}

impl RunReport {
    pub fn all_succeeded(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| r.success)
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}
