//! External collaborators consumed by the scheduler.
//!
//! Each is an opaque, async seam: the core never knows which model, tool
//! server, filesystem or shell sits behind it. Concrete implementations live
//! in `hive-plugins`; tests plug in stubs.

mod fs;
mod reasoning;
mod shell;
mod tool;

pub use fs::{FileStat, Filesystem, FsError};
pub use reasoning::{ReasoningCall, ReasoningError, ReasoningErrorKind, ReasoningRequest};
pub use shell::{ShellError, ShellExec, ShellOutput};
pub use tool::{ToolCall, ToolCallError};

use std::sync::Arc;

/// The set of collaborators a dispatcher routes to.
#[derive(Clone)]
pub struct Collaborators {
    pub reasoning: Arc<dyn ReasoningCall>,
    pub tools: Arc<dyn ToolCall>,
    pub fs: Arc<dyn Filesystem>,
    pub shell: Arc<dyn ShellExec>,
}
