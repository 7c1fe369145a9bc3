//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `hive_core::api` instead of reaching into internal modules.

pub use crate::backend::{
    Collaborators, FileStat, Filesystem, FsError, ReasoningCall, ReasoningError,
    ReasoningErrorKind, ReasoningRequest, ShellError, ShellExec, ShellOutput, ToolCall,
    ToolCallError,
};
pub use crate::config::{
    load_default, load_from_path, AppConfig, DeadlockPolicy, HealingConfig, LoggingConfig,
    ProjectConfig, ReasoningConfig, RoutingConfig, SandboxConfig, SchedulerConfig,
};
pub use crate::dispatch::{DispatchConfig, Dispatcher, HostPlatform, PathGuard};
pub use crate::error::{AggregateError, ConfigError, ExecutorError, TaskError};
pub use crate::executor::traits::{
    ConcurrencyContext, ConcurrencyStrategyPlugin, ExecutionContext, RetryStrategyPlugin,
    TaskExecutor,
};
pub use crate::executor::{
    AgentRole, ExecutionResult, RunReport, RunStatus, Scheduler, SchedulerBuilder, Task, TaskId,
    TaskOutput, ToolBinding,
};
pub use crate::healing::{HealingOutcome, LessonLearned, RepairExecutor, SelfHealingLoop};
