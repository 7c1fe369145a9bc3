//! Wavefront executor for task dependency graphs.
//!
//! Tasks run in waves: each wave is the set of pending tasks whose
//! dependencies have all completed (successfully or not). Waves run with a
//! bounded concurrency limiter, and every task attempt carries its own
//! timeout and retry policy.
//!
//! # Architecture
//!
//! ```text
//! &[Task]
//!   ↓
//! WorkingGraph::from_tasks()  (clone, prune self-deps, set duplicates aside)
//!   ↓
//! loop: frontier(completed) ─ empty? → recover_deadlock(policy)
//!   ↓
//! execute_wave_parallel()  (Semaphore + FuturesUnordered)
//!   ↓
//! RunState::record()  (completed set, results, ContextPropagator)
//!   ↓
//! RunReport { results (input order), waves, aggregate_error }
//! ```

pub mod cache;
pub mod context;
mod engine;
mod graph;
mod scheduler;
mod state;
pub mod traits;
pub mod types;

pub use cache::ReadCache;
pub use context::{apply_dependency_context, truncate_output, ContextPropagator};
pub use engine::{Scheduler, SchedulerBuilder};
pub use graph::WorkingGraph;
pub use scheduler::execute_wave_parallel;
pub use state::RunState;
pub use types::{
    AgentRole, ExecutionResult, RunReport, RunStatus, Task, TaskId, TaskOutput, ToolBinding,
};
