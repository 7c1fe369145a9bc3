use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::executor::types::TaskId;

/// Why a single task attempt failed.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TaskError {
    /// Bad sandbox path, rejected command or malformed input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The task body raised.
    #[error("execution error: {0}")]
    Execution(String),

    /// The attempt exceeded its deadline.
    #[error("attempt timed out after {0}ms")]
    Timeout(u64),

    #[error("tool `{tool}` failed: {message}")]
    Tool { tool: String, message: String },

    /// Output failed language-consistency validation after the corrective retry.
    #[error("hallucination detected: {0}")]
    Hallucination(String),

    /// Output was rejected by the response validator.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl TaskError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Execution(_) => "execution",
            Self::Timeout(_) => "timeout",
            Self::Tool { .. } => "tool",
            Self::Hallucination(_) => "hallucination",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }

    /// Whether the retry policy may run another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Execution(_) | Self::Timeout(_) | Self::Tool { .. }
        )
    }
}

/// Phase-level summary of every failed task in one `process()` call.
/// Informational only; never used for control flow.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{failed} of {total} tasks failed in {duration_ms}ms")]
pub struct AggregateError {
    pub failed: usize,
    pub total: usize,
    pub duration_ms: u64,
    pub errors: Vec<(TaskId, TaskError)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        assert!(TaskError::Timeout(10).is_retryable());
        assert!(TaskError::Execution("boom".into()).is_retryable());
        assert!(!TaskError::Validation("escape".into()).is_retryable());
        assert!(!TaskError::Hallucination("python".into()).is_retryable());
        assert!(!TaskError::InvalidResponse("refusal".into()).is_retryable());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let err = TaskError::Tool {
            tool: "search".into(),
            message: "bad query".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "tool");
        assert_eq!(json["detail"]["tool"], "search");
    }
}
