use std::collections::HashMap;

use super::types::TaskId;

/// Per-dependency character budget in a context block.
pub const DEFAULT_CONTEXT_BUDGET: usize = 2000;

pub const TRUNCATION_MARKER: &str = "...[truncated]";

/// Stores the primary output of successful tasks and renders bounded
/// context blocks for their dependents.
#[derive(Debug)]
pub struct ContextPropagator {
    budget: usize,
    outputs: HashMap<TaskId, String>,
}

impl Default for ContextPropagator {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_BUDGET)
    }
}

impl ContextPropagator {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            outputs: HashMap::new(),
        }
    }

    pub fn record(&mut self, task_id: TaskId, output: &str) {
        self.outputs
            .insert(task_id, truncate_output(output, self.budget));
    }

    pub fn get(&self, task_id: TaskId) -> Option<&str> {
        self.outputs.get(&task_id).map(String::as_str)
    }

    /// Build the context block for a task's dependencies. Empty when there
    /// are no dependencies or none of them stored an output.
    pub fn build(&self, dependencies: &[TaskId]) -> String {
        if dependencies.is_empty() {
            return String::new();
        }

        let mut context = String::with_capacity(dependencies.len() * 200 + 50);
        context.push_str("=== Dependency Outputs ===\n\n");

        let mut added = false;
        for dep_id in dependencies {
            let Some(output) = self.outputs.get(dep_id) else {
                continue;
            };
            if output.is_empty() {
                continue;
            }
            context.push_str(&format!("# Task: {dep_id}\n"));
            context.push_str(output);
            if !output.ends_with('\n') {
                context.push('\n');
            }
            context.push('\n');
            added = true;
        }

        if !added {
            return String::new();
        }

        context.push_str("=== End Dependency Outputs ===\n");
        context
    }
}

/// Cut `output` to `budget` characters, appending [`TRUNCATION_MARKER`] when cut.
pub fn truncate_output(output: &str, budget: usize) -> String {
    match output.char_indices().nth(budget) {
        None => output.to_string(),
        Some((byte_idx, _)) => {
            let mut cut = String::with_capacity(byte_idx + TRUNCATION_MARKER.len() + 1);
            cut.push_str(&output[..byte_idx]);
            cut.push('\n');
            cut.push_str(TRUNCATION_MARKER);
            cut
        }
    }
}

/// Prepend a context block to task instructions.
pub fn apply_dependency_context(content: &str, context: &str) -> String {
    if context.is_empty() {
        return content.to_string();
    }
    if context.ends_with('\n') {
        format!("{context}\n{content}")
    } else {
        format!("{context}\n\n{content}")
    }
}
