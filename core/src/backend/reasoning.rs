use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningRequest {
    pub prompt: String,
    pub timeout: Duration,
    /// Forced backend override, passed through untouched.
    pub backend: Option<String>,
}

impl ReasoningRequest {
    pub fn new(prompt: impl Into<String>, timeout: Duration) -> Self {
        Self {
            prompt: prompt.into(),
            timeout,
            backend: None,
        }
    }

    pub fn with_backend(mut self, backend: Option<String>) -> Self {
        self.backend = backend;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningErrorKind {
    Timeout,
    Connection,
    Status,
    Decode,
    Other,
}

impl ReasoningErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connection => "connection",
            Self::Status => "status",
            Self::Decode => "decode",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ReasoningErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("reasoning call failed ({kind}): {message}")]
pub struct ReasoningError {
    pub kind: ReasoningErrorKind,
    pub message: String,
}

impl ReasoningError {
    pub fn new(kind: ReasoningErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ReasoningErrorKind::Timeout, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ReasoningErrorKind::Connection, message)
    }
}

/// Opaque text-in/text-out reasoning call.
#[async_trait]
pub trait ReasoningCall: Send + Sync {
    fn name(&self) -> &str;

    async fn reason(&self, request: ReasoningRequest) -> Result<String, ReasoningError>;
}
