use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;

use crate::error::TaskError;

use super::types::{ExecutionResult, Task};

/// Execute a single wave of tasks in parallel
///
/// # Arguments
///
/// * `tasks` - Working copies of the tasks in this wave
/// * `max_concurrency` - Maximum number of task attempts in flight
/// * `executor_fn` - Async function running one task to its final result
///
/// # Returns
///
/// One result per task, in completion order. A failing task never aborts
/// its siblings.
pub async fn execute_wave_parallel<F, Fut>(
    tasks: Vec<Task>,
    max_concurrency: usize,
    executor_fn: F,
) -> Vec<ExecutionResult>
where
    F: Fn(Task) -> Fut + Clone + Send + 'static,
    Fut: std::future::Future<Output = ExecutionResult> + Send,
{
    let sem = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut futs: FuturesUnordered<_> = FuturesUnordered::new();

    for task in tasks {
        let sem = sem.clone();
        let executor = executor_fn.clone();

        futs.push(async move {
            let task_id = task.id;
            let Ok(_permit) = sem.acquire_owned().await else {
                return ExecutionResult::failed(
                    task_id,
                    TaskError::Execution("concurrency limiter closed unexpectedly".into()),
                );
            };

            executor(task).await
        });
    }

    let mut results = Vec::with_capacity(futs.len());
    while let Some(result) = futs.next().await {
        results.push(result);
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::types::{AgentRole, TaskOutput};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn limiter_bounds_in_flight_tasks() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<Task> = (1..=6)
            .map(|id| Task::new(id, AgentRole::General, "noop"))
            .collect();

        let results = execute_wave_parallel(tasks, 2, {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            move |task: Task| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    ExecutionResult::succeeded(task.id, TaskOutput::text("ok"))
                }
            }
        })
        .await;

        assert_eq!(results.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
