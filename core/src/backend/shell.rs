use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShellError {
    #[error("spawn failed: {0}")]
    Spawn(String),

    #[error("command timed out after {0}ms")]
    Timeout(u64),

    #[error("io error: {0}")]
    Io(String),
}

/// Host shell runner. Only ever receives commands that passed the command
/// policy and the translator.
#[async_trait]
pub trait ShellExec: Send + Sync {
    async fn exec(
        &self,
        command: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> Result<ShellOutput, ShellError>;
}
