use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::{AppConfig, DeadlockPolicy, SchedulerConfig};
use crate::error::{AggregateError, ExecutorError, TaskError};
use crate::healing::RepairExecutor;

use super::cache::ReadCache;
use super::context::{ContextPropagator, DEFAULT_CONTEXT_BUDGET};
use super::graph::WorkingGraph;
use super::state::RunState;
use super::traits::{
    ConcurrencyContext, ConcurrencyStrategyPlugin, ExecutionContext, RetryStrategyPlugin,
    TaskExecutor,
};
use super::types::{ExecutionResult, RunReport, RunStatus, Task, TaskId};

/// Wavefront scheduler for task dependency graphs.
///
/// Holds no per-run state besides the status snapshot; every `process()`
/// call builds its own [`RunState`], so independent runs never share
/// completion maps or read caches.
pub struct Scheduler {
    config: SchedulerConfig,
    cache_ttl: Duration,
    cache_capacity: usize,
    context_budget: usize,
    executor: Arc<dyn TaskExecutor>,
    retry_strategy: Option<Arc<dyn RetryStrategyPlugin>>,
    concurrency_strategy: Option<Arc<dyn ConcurrencyStrategyPlugin>>,
    status: Mutex<RunStatus>,
}

pub struct SchedulerBuilder {
    config: AppConfig,
    executor: Arc<dyn TaskExecutor>,
    retry_strategy: Option<Arc<dyn RetryStrategyPlugin>>,
    concurrency_strategy: Option<Arc<dyn ConcurrencyStrategyPlugin>>,
    context_budget: usize,
}

impl Scheduler {
    pub fn builder(config: &AppConfig, executor: Arc<dyn TaskExecutor>) -> SchedulerBuilder {
        SchedulerBuilder::new(config, executor)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Progress counters of the current or most recent run.
    pub fn get_status(&self) -> RunStatus {
        match self.status.lock() {
            Ok(status) => *status,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Wave layout the scheduler would use, computed without executing.
    pub fn plan(&self, tasks: &[Task]) -> Result<Vec<Vec<TaskId>>, ExecutorError> {
        let graph = WorkingGraph::from_tasks(tasks);
        if let Some(dup) = graph.duplicates().first() {
            return Err(ExecutorError::DuplicateTaskId(dup.id));
        }
        graph.plan_waves(self.config.deadlock_policy, self.config.max_iterations)
    }

    /// Run every task to a final result.
    ///
    /// Per-task failures, deadlock handling and the iteration guard are all
    /// folded into the returned results; nothing here returns an error.
    pub async fn process(&self, tasks: &[Task]) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        let start = Instant::now();
        let total = tasks.len();

        let mut graph = WorkingGraph::from_tasks(tasks);
        let mut state = RunState::new(
            run_id.clone(),
            ContextPropagator::new(self.context_budget),
            ReadCache::new(self.cache_ttl, self.cache_capacity),
        );
        let mut waves: Vec<Vec<TaskId>> = Vec::new();
        let mut stopped: Option<TaskError> = None;

        self.set_status(RunStatus {
            completed: 0,
            total,
            failed: 0,
        });

        tracing::info!(
            target: "hive.sched",
            run_id = %run_id,
            tasks = total,
            policy = self.config.deadlock_policy.as_str(),
            "run start"
        );

        let mut iterations = 0usize;
        while graph.has_pending() {
            if iterations >= self.config.max_iterations {
                tracing::warn!(
                    target: "hive.sched",
                    run_id = %run_id,
                    limit = self.config.max_iterations,
                    pending = ?graph.pending(),
                    "iteration guard tripped; remaining tasks left undispatched"
                );
                stopped = Some(TaskError::Execution(
                    ExecutorError::IterationLimit(self.config.max_iterations).to_string(),
                ));
                break;
            }
            iterations += 1;

            let frontier = graph.frontier(state.completed());
            if frontier.is_empty() {
                match graph.recover_deadlock(self.config.deadlock_policy, state.completed()) {
                    Ok(cleared) => {
                        tracing::warn!(
                            target: "hive.sched",
                            run_id = %run_id,
                            policy = self.config.deadlock_policy.as_str(),
                            cleared_edges = cleared,
                            pending = ?graph.pending(),
                            "deadlock detected; dependencies force-cleared"
                        );
                        continue;
                    }
                    Err(err) => {
                        tracing::warn!(
                            target: "hive.sched",
                            run_id = %run_id,
                            error = %err,
                            "deadlock detected; failing remaining tasks"
                        );
                        stopped = Some(TaskError::Validation(err.to_string()));
                        break;
                    }
                }
            }

            let wave = waves.len();
            graph.mark_dispatched(&frontier);
            let wave_results = self.execute_wave(wave, &frontier, &graph, &state).await;
            for result in wave_results {
                state.record(result);
            }

            let status = state.status(total);
            self.set_status(status);
            tracing::info!(
                target: "hive.sched",
                run_id = %run_id,
                wave = wave,
                size = frontier.len(),
                completed = status.completed,
                failed = status.failed,
                "wave end"
            );
            waves.push(frontier);
        }

        if let Some(reason) = stopped {
            for id in graph.pending() {
                state.record(ExecutionResult::failed(id, reason.clone()));
            }
        }

        let results = collect_in_input_order(tasks, &mut state);
        let duration_ms = start.elapsed().as_millis() as u64;
        let aggregate_error = aggregate_failures(&results, duration_ms);

        self.set_status(RunStatus {
            completed: results.len(),
            total,
            failed: results.iter().filter(|r| !r.success).count(),
        });

        match &aggregate_error {
            Some(agg) => tracing::warn!(
                target: "hive.sched",
                run_id = %run_id,
                duration_ms = duration_ms,
                "{agg}"
            ),
            None => tracing::info!(
                target: "hive.sched",
                run_id = %run_id,
                duration_ms = duration_ms,
                waves = waves.len(),
                "run end"
            ),
        }

        RunReport {
            run_id,
            results,
            waves,
            duration_ms,
            aggregate_error,
        }
    }

    async fn execute_wave(
        &self,
        wave: usize,
        task_ids: &[TaskId],
        graph: &WorkingGraph,
        state: &RunState,
    ) -> Vec<ExecutionResult> {
        let base = self.config.concurrency_ceiling();
        let max_concurrency = self
            .concurrency_strategy
            .as_ref()
            .map(|strategy| {
                strategy.calculate_concurrency(&ConcurrencyContext {
                    base_concurrency: base,
                    wave_size: task_ids.len(),
                })
            })
            .unwrap_or(base)
            .clamp(1, base);

        tracing::info!(
            target: "hive.sched",
            run_id = state.run_id(),
            wave = wave,
            tasks = ?task_ids,
            max_concurrency = max_concurrency,
            "wave start"
        );

        let tasks: Vec<Task> = task_ids
            .iter()
            .filter_map(|id| graph.task(*id).cloned())
            .collect();

        let contexts: HashMap<TaskId, String> = task_ids
            .iter()
            .map(|id| (*id, state.dependency_context(graph.declared(*id))))
            .collect();
        let contexts = Arc::new(contexts);

        let base_ctx = ExecutionContext {
            run_id: state.run_id().to_string(),
            wave,
            attempt: 1,
            dependency_context: String::new(),
            read_cache: state.read_cache(),
        };
        let executor = self.executor.clone();
        let retry_strategy = self.retry_strategy.clone();
        let timeout = self.config.task_timeout();

        let executor_fn = move |task: Task| {
            let executor = executor.clone();
            let retry_strategy = retry_strategy.clone();
            let mut ctx = base_ctx.clone();
            ctx.dependency_context = contexts.get(&task.id).cloned().unwrap_or_default();

            async move { run_task(executor, retry_strategy, timeout, task, ctx).await }
        };

        super::scheduler::execute_wave_parallel(tasks, max_concurrency, executor_fn).await
    }

    fn set_status(&self, status: RunStatus) {
        match self.status.lock() {
            Ok(mut guard) => *guard = status,
            Err(poisoned) => *poisoned.into_inner() = status,
        }
    }
}

/// One task through its attempts: timeout per attempt, retry policy between
/// attempts, a single final result.
async fn run_task(
    executor: Arc<dyn TaskExecutor>,
    retry_strategy: Option<Arc<dyn RetryStrategyPlugin>>,
    timeout: Duration,
    task: Task,
    mut ctx: ExecutionContext,
) -> ExecutionResult {
    let start = Instant::now();
    let max_attempts = retry_strategy
        .as_ref()
        .map(|strategy| strategy.max_attempts().max(1))
        .unwrap_or(1);

    let mut attempt: u32 = 1;
    let mut result = loop {
        ctx.attempt = attempt;
        let outcome = match tokio::time::timeout(timeout, executor.execute(&task, &ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TaskError::Timeout(timeout.as_millis() as u64)),
        };

        let err = match outcome {
            Ok(output) => break ExecutionResult::succeeded(task.id, output),
            Err(err) => err,
        };

        let delay = retry_strategy
            .as_ref()
            .filter(|strategy| attempt < max_attempts && strategy.should_retry(attempt, &err))
            .and_then(|strategy| strategy.next_delay(attempt - 1, &err));

        match delay {
            Some(delay) => {
                tracing::warn!(
                    target: "hive.sched",
                    task_id = task.id,
                    attempt = attempt,
                    kind = err.kind(),
                    delay_ms = delay.as_millis() as u64,
                    "attempt failed, retrying: {err}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            None => {
                tracing::warn!(
                    target: "hive.sched",
                    task_id = task.id,
                    attempts = attempt,
                    kind = err.kind(),
                    "task failed: {err}"
                );
                break ExecutionResult::failed(task.id, err);
            }
        }
    };

    result.attempts = attempt;
    result.duration_ms = start.elapsed().as_millis() as u64;
    result
}

fn collect_in_input_order(tasks: &[Task], state: &mut RunState) -> Vec<ExecutionResult> {
    let mut seen = HashSet::new();
    tasks
        .iter()
        .map(|task| {
            if !seen.insert(task.id) {
                return ExecutionResult::failed(
                    task.id,
                    TaskError::Validation(
                        ExecutorError::DuplicateTaskId(task.id).to_string(),
                    ),
                );
            }
            state.take_result(task.id).unwrap_or_else(|| {
                ExecutionResult::failed(
                    task.id,
                    TaskError::Execution("task was never dispatched".into()),
                )
            })
        })
        .collect()
}

fn aggregate_failures(results: &[ExecutionResult], duration_ms: u64) -> Option<AggregateError> {
    let errors: Vec<(TaskId, TaskError)> = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| {
            let err = r
                .error
                .clone()
                .unwrap_or_else(|| TaskError::Execution("unknown failure".into()));
            (r.task_id, err)
        })
        .collect();

    if errors.is_empty() {
        return None;
    }

    Some(AggregateError {
        failed: errors.len(),
        total: results.len(),
        duration_ms,
        errors,
    })
}

#[async_trait]
impl RepairExecutor for Scheduler {
    async fn execute_repair(&self, tasks: &[Task]) -> Vec<ExecutionResult> {
        self.process(tasks).await.results
    }
}

impl SchedulerBuilder {
    pub fn new(config: &AppConfig, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            config: config.clone(),
            executor,
            retry_strategy: None,
            concurrency_strategy: None,
            context_budget: DEFAULT_CONTEXT_BUDGET,
        }
    }

    pub fn retry_strategy(mut self, strategy: Arc<dyn RetryStrategyPlugin>) -> Self {
        self.retry_strategy = Some(strategy);
        self
    }

    pub fn concurrency_strategy(mut self, strategy: Arc<dyn ConcurrencyStrategyPlugin>) -> Self {
        self.concurrency_strategy = Some(strategy);
        self
    }

    pub fn deadlock_policy(mut self, policy: DeadlockPolicy) -> Self {
        self.config.scheduler.deadlock_policy = policy;
        self
    }

    pub fn context_budget(mut self, budget: usize) -> Self {
        self.context_budget = budget;
        self
    }

    pub fn build(self) -> Result<Scheduler, ExecutorError> {
        self.config.validate()?;

        Ok(Scheduler {
            cache_ttl: self.config.sandbox.read_cache_ttl(),
            cache_capacity: self.config.sandbox.read_cache_capacity,
            config: self.config.scheduler,
            context_budget: self.context_budget,
            executor: self.executor,
            retry_strategy: self.retry_strategy,
            concurrency_strategy: self.concurrency_strategy,
            status: Mutex::new(RunStatus::default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::types::{AgentRole, TaskOutput};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        failures_left: AtomicU32,
        error: TaskError,
    }

    #[async_trait]
    impl TaskExecutor for Flaky {
        async fn execute(
            &self,
            task: &Task,
            _ctx: &ExecutionContext,
        ) -> Result<TaskOutput, TaskError> {
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(self.error.clone());
            }
            Ok(TaskOutput::text(format!("done {}", task.id)))
        }
    }

    struct TwoTries;

    impl RetryStrategyPlugin for TwoTries {
        fn name(&self) -> &str {
            "two-tries"
        }
        fn next_delay(&self, _attempt: u32, _error: &TaskError) -> Option<Duration> {
            Some(Duration::from_millis(1))
        }
        fn max_attempts(&self) -> u32 {
            2
        }
    }

    fn scheduler(executor: Arc<dyn TaskExecutor>) -> Scheduler {
        Scheduler::builder(&AppConfig::default(), executor)
            .retry_strategy(Arc::new(TwoTries))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn retryable_error_is_retried_once() {
        let executor = Arc::new(Flaky {
            failures_left: AtomicU32::new(1),
            error: TaskError::Execution("transient".into()),
        });
        let report = scheduler(executor)
            .process(&[Task::new(1, AgentRole::Coder, "x")])
            .await;

        assert!(report.all_succeeded());
        assert_eq!(report.results[0].attempts, 2);
        assert!(report.aggregate_error.is_none());
    }

    #[tokio::test]
    async fn fatal_error_is_not_retried() {
        let executor = Arc::new(Flaky {
            failures_left: AtomicU32::new(5),
            error: TaskError::Validation("outside sandbox".into()),
        });
        let report = scheduler(executor)
            .process(&[Task::new(1, AgentRole::Coder, "x")])
            .await;

        let result = &report.results[0];
        assert!(!result.success);
        assert_eq!(result.attempts, 1);
        assert!(matches!(result.error, Some(TaskError::Validation(_))));
        let agg = report.aggregate_error.unwrap();
        assert_eq!((agg.failed, agg.total), (1, 1));
    }

    #[tokio::test]
    async fn duplicate_ids_fail_validation() {
        let executor = Arc::new(Flaky {
            failures_left: AtomicU32::new(0),
            error: TaskError::Execution("unused".into()),
        });
        let tasks = [
            Task::new(1, AgentRole::Coder, "first"),
            Task::new(1, AgentRole::Coder, "second"),
        ];
        let sched = scheduler(executor);
        let report = sched.process(&tasks).await;

        assert!(report.results[0].success);
        assert!(matches!(
            report.results[1].error,
            Some(TaskError::Validation(_))
        ));
        assert!(matches!(
            sched.plan(&tasks),
            Err(ExecutorError::DuplicateTaskId(1))
        ));
        assert_eq!(
            sched.get_status(),
            RunStatus {
                completed: 2,
                total: 2,
                failed: 1
            }
        );
    }

    #[tokio::test]
    async fn fail_fast_policy_fails_cycle_members() {
        let executor = Arc::new(Flaky {
            failures_left: AtomicU32::new(0),
            error: TaskError::Execution("unused".into()),
        });
        let sched = Scheduler::builder(&AppConfig::default(), executor)
            .deadlock_policy(DeadlockPolicy::FailFast)
            .build()
            .unwrap();
        let report = sched
            .process(&[
                Task::new(1, AgentRole::Coder, "a").with_dependencies([2]),
                Task::new(2, AgentRole::Coder, "b").with_dependencies([1]),
                Task::new(3, AgentRole::Coder, "c"),
            ])
            .await;

        assert!(!report.results[0].success);
        assert!(!report.results[1].success);
        assert!(report.results[2].success);
        assert!(matches!(
            report.results[0].error,
            Some(TaskError::Validation(_))
        ));
    }
}
