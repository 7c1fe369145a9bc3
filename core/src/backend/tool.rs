use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolCallError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("{0}")]
    Failed(String),
}

/// Structured, externally defined capability.
#[async_trait]
pub trait ToolCall: Send + Sync {
    /// Names of the tools this collaborator can serve, already normalized.
    fn available_tools(&self) -> Vec<String> {
        Vec::new()
    }

    async fn call(&self, tool: &str, params: &Map<String, Value>) -> Result<Value, ToolCallError>;
}
