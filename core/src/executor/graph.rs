use std::collections::{HashMap, HashSet};

use crate::config::DeadlockPolicy;
use crate::error::ExecutorError;

use super::types::{Task, TaskId};

/// Internally-derived working copy of a task graph.
///
/// Caller-supplied tasks are never mutated: pruning and deadlock recovery
/// operate on the clones held here.
#[derive(Debug, Clone)]
pub struct WorkingGraph {
    /// Task nodes: task_id -> working copy
    nodes: HashMap<TaskId, Task>,

    /// Original insertion order (for stable waves)
    insertion_order: Vec<TaskId>,

    /// Tasks not yet dispatched
    pending: HashSet<TaskId>,

    /// Dependencies after pruning, before any deadlock recovery
    declared: HashMap<TaskId, Vec<TaskId>>,

    /// Later occurrences of an id that was already taken
    duplicates: Vec<Task>,
}

impl WorkingGraph {
    /// Construct the working graph, pruning self-dependencies and repeated
    /// dependency ids.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut nodes = HashMap::with_capacity(tasks.len());
        let mut insertion_order = Vec::with_capacity(tasks.len());
        let mut declared = HashMap::with_capacity(tasks.len());
        let mut duplicates = Vec::new();

        for task in tasks {
            if nodes.contains_key(&task.id) {
                duplicates.push(task.clone());
                continue;
            }

            let mut working = task.clone();
            let mut seen = HashSet::new();
            working
                .dependencies
                .retain(|dep| *dep != task.id && seen.insert(*dep));
            if working.dependencies.len() != task.dependencies.len() {
                tracing::debug!(
                    "task {} dependencies pruned: {:?} -> {:?}",
                    task.id,
                    task.dependencies,
                    working.dependencies
                );
            }

            insertion_order.push(task.id);
            declared.insert(task.id, working.dependencies.clone());
            nodes.insert(task.id, working);
        }

        let pending = insertion_order.iter().copied().collect();

        Self {
            nodes,
            insertion_order,
            pending,
            declared,
            duplicates,
        }
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.nodes.get(&id)
    }

    /// Dependencies as declared (self-edges removed), unaffected by recovery.
    pub fn declared(&self, id: TaskId) -> &[TaskId] {
        self.declared.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn duplicates(&self) -> &[Task] {
        &self.duplicates
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Pending task ids in insertion order.
    pub fn pending(&self) -> Vec<TaskId> {
        self.insertion_order
            .iter()
            .copied()
            .filter(|id| self.pending.contains(id))
            .collect()
    }

    /// Pending tasks whose every dependency has completed (success or not).
    pub fn frontier(&self, completed: &HashSet<TaskId>) -> Vec<TaskId> {
        self.insertion_order
            .iter()
            .copied()
            .filter(|id| self.pending.contains(id))
            .filter(|id| {
                self.nodes[id]
                    .dependencies
                    .iter()
                    .all(|dep| completed.contains(dep))
            })
            .collect()
    }

    pub fn mark_dispatched(&mut self, ids: &[TaskId]) {
        for id in ids {
            self.pending.remove(id);
        }
    }

    /// Apply the deadlock policy when the frontier is empty but tasks remain.
    /// Returns the number of dependency edges removed.
    pub fn recover_deadlock(
        &mut self,
        policy: DeadlockPolicy,
        completed: &HashSet<TaskId>,
    ) -> Result<usize, ExecutorError> {
        match policy {
            DeadlockPolicy::FailFast => {
                let detail = match self.detect_cycle() {
                    Some(cycle) => {
                        return Err(ExecutorError::CircularDependency(format_cycle_path(
                            &cycle,
                        )))
                    }
                    None => self.describe_blocked(completed),
                };
                Err(ExecutorError::UnresolvedDependencies(detail))
            }
            DeadlockPolicy::ForceClearAll => Ok(self.clear_all_pending_dependencies()),
            DeadlockPolicy::ForceClearCycle => {
                let removed = self.drop_unknown_dependencies();
                if removed > 0 {
                    return Ok(removed);
                }
                match self.detect_cycle() {
                    Some(cycle) => Ok(self.break_cycle(&cycle)),
                    None => Ok(self.clear_all_pending_dependencies()),
                }
            }
        }
    }

    fn clear_all_pending_dependencies(&mut self) -> usize {
        let mut removed = 0;
        for id in &self.pending {
            if let Some(task) = self.nodes.get_mut(id) {
                removed += task.dependencies.len();
                task.dependencies.clear();
            }
        }
        removed
    }

    /// Remove dependency ids that name no task in this graph.
    fn drop_unknown_dependencies(&mut self) -> usize {
        let known: HashSet<TaskId> = self.nodes.keys().copied().collect();
        let mut removed = 0;
        for id in &self.pending {
            if let Some(task) = self.nodes.get_mut(id) {
                let before = task.dependencies.len();
                task.dependencies.retain(|dep| known.contains(dep));
                removed += before - task.dependencies.len();
            }
        }
        removed
    }

    /// Remove the edges along `cycle` (a -> b meaning a depends on b).
    fn break_cycle(&mut self, cycle: &[TaskId]) -> usize {
        let mut removed = 0;
        for pair in cycle.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            if let Some(task) = self.nodes.get_mut(&from) {
                let before = task.dependencies.len();
                task.dependencies.retain(|dep| *dep != to);
                removed += before - task.dependencies.len();
            }
        }
        removed
    }

    /// Detect a dependency cycle among pending tasks using DFS.
    ///
    /// Returns the path with the first node repeated at the end.
    pub fn detect_cycle(&self) -> Option<Vec<TaskId>> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        for task_id in &self.insertion_order {
            if !self.pending.contains(task_id) || visited.contains(task_id) {
                continue;
            }
            if self.dfs_cycle(*task_id, &mut visited, &mut stack) {
                return Some(stack);
            }
        }

        None
    }

    fn dfs_cycle(
        &self,
        node: TaskId,
        visited: &mut HashSet<TaskId>,
        stack: &mut Vec<TaskId>,
    ) -> bool {
        visited.insert(node);
        stack.push(node);

        if let Some(task) = self.nodes.get(&node) {
            for dep in &task.dependencies {
                if !self.pending.contains(dep) {
                    continue;
                }

                // Check if dependency is in current path (cycle detected)
                if let Some(pos) = stack.iter().position(|x| x == dep) {
                    stack.push(*dep);
                    *stack = stack[pos..].to_vec();
                    return true;
                }

                if !visited.contains(dep) && self.dfs_cycle(*dep, visited, stack) {
                    return true;
                }
            }
        }

        stack.pop();
        false
    }

    fn describe_blocked(&self, completed: &HashSet<TaskId>) -> String {
        self.pending()
            .into_iter()
            .map(|id| {
                let missing: Vec<String> = self.nodes[&id]
                    .dependencies
                    .iter()
                    .filter(|dep| !completed.contains(dep))
                    .map(|dep| dep.to_string())
                    .collect();
                format!("task {id} waits on [{}]", missing.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Compute the wave layout without executing anything, applying the same
    /// deadlock policy the scheduler would.
    pub fn plan_waves(
        mut self,
        policy: DeadlockPolicy,
        max_iterations: usize,
    ) -> Result<Vec<Vec<TaskId>>, ExecutorError> {
        let mut completed = HashSet::new();
        let mut waves = Vec::new();
        let mut iterations = 0;

        while self.has_pending() {
            if iterations >= max_iterations {
                return Err(ExecutorError::IterationLimit(max_iterations));
            }
            iterations += 1;

            let frontier = self.frontier(&completed);
            if frontier.is_empty() {
                self.recover_deadlock(policy, &completed)?;
                continue;
            }

            self.mark_dispatched(&frontier);
            completed.extend(frontier.iter().copied());
            waves.push(frontier);
        }

        Ok(waves)
    }
}

fn format_cycle_path(cycle: &[TaskId]) -> String {
    cycle
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::types::AgentRole;
    use pretty_assertions::assert_eq;

    fn task(id: TaskId, deps: &[TaskId]) -> Task {
        Task::new(id, AgentRole::Coder, format!("task {id}")).with_dependencies(deps.to_vec())
    }

    #[test]
    fn self_dependencies_are_pruned_on_the_copy() {
        let tasks = vec![task(5, &[5])];
        let graph = WorkingGraph::from_tasks(&tasks);

        assert!(graph.task(5).unwrap().dependencies.is_empty());
        assert_eq!(tasks[0].dependencies, vec![5]);
        assert_eq!(graph.frontier(&HashSet::new()), vec![5]);
    }

    #[test]
    fn empty_dependency_tasks_form_the_first_wave() {
        let graph = WorkingGraph::from_tasks(&[task(1, &[]), task(2, &[1]), task(3, &[])]);
        assert_eq!(graph.frontier(&HashSet::new()), vec![1, 3]);
    }

    #[test]
    fn failed_dependency_still_unblocks() {
        let graph = WorkingGraph::from_tasks(&[task(1, &[]), task(2, &[1])]);
        let completed: HashSet<TaskId> = [1].into_iter().collect();
        assert_eq!(graph.frontier(&completed), vec![1, 2]);
    }

    #[test]
    fn duplicates_are_set_aside() {
        let graph = WorkingGraph::from_tasks(&[task(1, &[]), task(1, &[])]);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.duplicates().len(), 1);
    }

    #[test]
    fn plan_layers_diamond() {
        let graph = WorkingGraph::from_tasks(&[
            task(1, &[]),
            task(2, &[1]),
            task(3, &[1]),
            task(4, &[2, 3]),
        ]);
        let waves = graph.plan_waves(DeadlockPolicy::FailFast, 100).unwrap();
        assert_eq!(waves, vec![vec![1], vec![2, 3], vec![4]]);
    }

    #[test]
    fn detect_two_cycle() {
        let graph = WorkingGraph::from_tasks(&[task(1, &[2]), task(2, &[1])]);
        let cycle = graph.detect_cycle().unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 3);
    }

    #[test]
    fn fail_fast_reports_cycle() {
        let graph = WorkingGraph::from_tasks(&[task(1, &[2]), task(2, &[1])]);
        let err = graph.plan_waves(DeadlockPolicy::FailFast, 100).unwrap_err();
        assert!(matches!(err, ExecutorError::CircularDependency(_)));
    }

    #[test]
    fn force_clear_all_resolves_cycle_and_unrelated_waiters() {
        let graph = WorkingGraph::from_tasks(&[task(1, &[2]), task(2, &[1]), task(3, &[99])]);
        let waves = graph.plan_waves(DeadlockPolicy::ForceClearAll, 100).unwrap();
        assert_eq!(waves, vec![vec![1, 2, 3]]);
    }

    #[test]
    fn recovery_keeps_declared_dependencies() {
        let mut graph = WorkingGraph::from_tasks(&[task(1, &[2]), task(2, &[1])]);
        graph
            .recover_deadlock(DeadlockPolicy::ForceClearAll, &HashSet::new())
            .unwrap();
        assert!(graph.task(1).unwrap().dependencies.is_empty());
        assert_eq!(graph.declared(1), &[2]);
    }

    #[test]
    fn force_clear_cycle_keeps_unrelated_order() {
        let graph = WorkingGraph::from_tasks(&[
            task(1, &[2]),
            task(2, &[1]),
            task(3, &[4]),
            task(4, &[]),
        ]);
        let waves = graph
            .plan_waves(DeadlockPolicy::ForceClearCycle, 100)
            .unwrap();
        // 3 still waits on 4; only the 1 <-> 2 cycle gets broken.
        assert_eq!(waves[0], vec![4]);
        assert!(waves.iter().flatten().count() == 4);
        let wave_of = |id: TaskId| waves.iter().position(|w| w.contains(&id)).unwrap();
        assert!(wave_of(3) > wave_of(4));
    }

    #[test]
    fn force_clear_cycle_drops_unknown_ids_first() {
        let graph = WorkingGraph::from_tasks(&[task(1, &[42]), task(2, &[1])]);
        let waves = graph
            .plan_waves(DeadlockPolicy::ForceClearCycle, 100)
            .unwrap();
        assert_eq!(waves, vec![vec![1], vec![2]]);
    }
}
