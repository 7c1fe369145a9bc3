//! Self-healing loop.
//!
//! After a graph run, an evaluator (the reasoning collaborator) sees the
//! objective and a compact view of every result so far. It either answers
//! with the success sentinel or returns a small repair plan, which is run
//! through a [`RepairExecutor`] (normally the scheduler itself). Each repair
//! cycle leaves one [`LessonLearned`].
//!
//! ```text
//! results ──► evaluate ──► OBJECTIVE_ACHIEVED ──► done
//!                │
//!                └── repair plan ──► namespace ids ──► execute_repair ──┐
//!                        ▲                                              │
//!                        └──────────────── next cycle ◄─────────────────┘
//! ```

mod lesson;
mod plan;

pub use lesson::LessonLearned;
pub use plan::{
    namespace_plan, parse_evaluation, Evaluation, RepairTask, MAX_REPAIR_TASKS,
    REPAIR_ID_STRIDE, SUCCESS_SENTINEL,
};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::backend::{ReasoningCall, ReasoningRequest};
use crate::config::HealingConfig;
use crate::executor::types::{ExecutionResult, Task, TaskId};

/// Runs repair tasks. The scheduler implements this.
#[async_trait]
pub trait RepairExecutor: Send + Sync {
    async fn execute_repair(&self, tasks: &[Task]) -> Vec<ExecutionResult>;
}

#[derive(Debug, Clone, Serialize)]
pub struct HealingOutcome {
    pub success: bool,
    /// Original results followed by every repair generation.
    pub final_results: Vec<ExecutionResult>,
    pub repair_cycles: u32,
    pub lessons: Vec<LessonLearned>,
}

/// Compact per-result view sent to the evaluator.
#[derive(Debug, Serialize)]
struct ResultDigest {
    id: TaskId,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    summary: String,
}

pub struct SelfHealingLoop {
    reasoning: Arc<dyn ReasoningCall>,
    config: HealingConfig,
    timeout: Duration,
    backend: Option<String>,
}

impl SelfHealingLoop {
    pub fn new(reasoning: Arc<dyn ReasoningCall>, config: HealingConfig, timeout: Duration) -> Self {
        Self {
            reasoning,
            config,
            timeout,
            backend: None,
        }
    }

    pub fn with_backend(mut self, backend: Option<String>) -> Self {
        self.backend = backend;
        self
    }

    pub fn max_cycles(&self) -> u32 {
        self.config.max_cycles
    }

    /// Evaluate and repair until the evaluator reports success, the cycle
    /// budget runs out, or the evaluator gives an unusable answer.
    pub async fn run(
        &self,
        objective: &str,
        results: &[ExecutionResult],
        executor: &dyn RepairExecutor,
    ) -> HealingOutcome {
        let mut accumulated = results.to_vec();
        let mut latest = results.to_vec();
        let mut lessons = Vec::new();
        let mut cycles = 0u32;

        while cycles < self.config.max_cycles {
            let prompt = self.evaluation_prompt(objective, &accumulated);
            let request =
                ReasoningRequest::new(prompt, self.timeout).with_backend(self.backend.clone());

            let reply = match self.reasoning.reason(request).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(
                        target: "hive.healing",
                        cycle = cycles + 1,
                        error = %e,
                        "evaluator unavailable, stopping"
                    );
                    break;
                }
            };

            let plan = match parse_evaluation(&reply) {
                Evaluation::Achieved => {
                    tracing::info!(
                        target: "hive.healing",
                        repair_cycles = cycles,
                        "objective achieved"
                    );
                    return HealingOutcome {
                        success: true,
                        final_results: accumulated,
                        repair_cycles: cycles,
                        lessons,
                    };
                }
                Evaluation::Repair(plan) => plan,
                Evaluation::Unparseable(reason) => {
                    tracing::warn!(
                        target: "hive.healing",
                        cycle = cycles + 1,
                        reason = %reason,
                        "evaluator reply unusable, stopping"
                    );
                    break;
                }
            };

            cycles += 1;
            let tasks = namespace_plan(&plan, cycles);
            tracing::info!(
                target: "hive.healing",
                cycle = cycles,
                repair_tasks = tasks.len(),
                "running repair plan"
            );

            let repair_results = executor.execute_repair(&tasks).await;
            let failed = repair_results.iter().filter(|r| !r.success).count();
            tracing::info!(
                target: "hive.healing",
                cycle = cycles,
                failed,
                "repair cycle finished"
            );

            lessons.push(LessonLearned::new(
                objective,
                describe_problem(&latest),
                describe_solution(&tasks, &repair_results),
                cycles,
            ));

            accumulated.extend(repair_results.iter().cloned());
            latest = repair_results;
        }

        if cycles >= self.config.max_cycles && self.config.max_cycles > 0 {
            tracing::warn!(
                target: "hive.healing",
                max_cycles = self.config.max_cycles,
                "repair cycles exhausted"
            );
        }

        HealingOutcome {
            success: !latest.is_empty() && latest.iter().all(|r| r.success),
            final_results: accumulated,
            repair_cycles: cycles,
            lessons,
        }
    }

    fn evaluation_prompt(&self, objective: &str, results: &[ExecutionResult]) -> String {
        let digests: Vec<ResultDigest> = results
            .iter()
            .map(|r| digest(r, self.config.summary_chars))
            .collect();
        let digest_json =
            serde_json::to_string_pretty(&digests).unwrap_or_else(|_| "[]".to_string());

        format!(
            "You are checking whether an objective has been achieved.\n\n\
             # Objective\n{objective}\n\n\
             # Task results\n{digest_json}\n\n\
             If the objective is fully achieved, reply with exactly {SUCCESS_SENTINEL}.\n\
             Otherwise reply with a JSON array of at most {MAX_REPAIR_TASKS} repair tasks, e.g.\n\
             [{{\"id\": 1, \"agent\": \"debugger\", \"task\": \"...\", \"dependencies\": []}}]\n\
             Ids are local to the plan; dependencies refer to those ids."
        )
    }
}

fn digest(result: &ExecutionResult, summary_chars: usize) -> ResultDigest {
    let summary: String = result
        .primary_output()
        .unwrap_or_default()
        .chars()
        .take(summary_chars)
        .collect();
    ResultDigest {
        id: result.task_id,
        success: result.success,
        error: result.error.as_ref().map(ToString::to_string),
        summary,
    }
}

fn describe_problem(results: &[ExecutionResult]) -> String {
    let failures: Vec<String> = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| match &r.error {
            Some(e) => format!("task {}: {e}", r.task_id),
            None => format!("task {} failed", r.task_id),
        })
        .collect();
    if failures.is_empty() {
        "evaluator judged the objective unmet".to_string()
    } else {
        failures.join("; ")
    }
}

fn describe_solution(tasks: &[Task], results: &[ExecutionResult]) -> String {
    let ok = results.iter().filter(|r| r.success).count();
    let steps: Vec<String> = tasks
        .iter()
        .map(|t| format!("[{}] {}", t.role, t.description))
        .collect();
    format!("{} ({ok}/{} succeeded)", steps.join("; "), results.len())
}
