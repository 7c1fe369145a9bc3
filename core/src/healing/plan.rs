//! Evaluator reply parsing and repair-plan normalization.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::executor::types::{AgentRole, Task, TaskId};

/// Literal reply meaning the objective is met.
pub const SUCCESS_SENTINEL: &str = "OBJECTIVE_ACHIEVED";

/// Repair ids of cycle `n` live in `n * REPAIR_ID_STRIDE ..`.
pub const REPAIR_ID_STRIDE: TaskId = 10_000;

/// Larger plans are cut to this many tasks.
pub const MAX_REPAIR_TASKS: usize = 10;

/// One entry of a repair plan as the evaluator wrote it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RepairTask {
    #[serde(default)]
    pub id: Option<TaskId>,

    #[serde(default, alias = "agent")]
    pub role: Option<String>,

    #[serde(alias = "task")]
    pub description: String,

    #[serde(default, alias = "deps")]
    pub dependencies: Vec<TaskId>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PlanShape {
    List(Vec<RepairTask>),
    Wrapped { tasks: Vec<RepairTask> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Achieved,
    Repair(Vec<RepairTask>),
    Unparseable(String),
}

/// Read an evaluator reply: the sentinel, a JSON plan (bare, fenced or
/// wrapped in `{"tasks": [...]}`), or neither.
pub fn parse_evaluation(reply: &str) -> Evaluation {
    let trimmed = reply.trim();

    if let Some(plan) = extract_plan(trimmed) {
        if plan.is_empty() {
            return if trimmed.contains(SUCCESS_SENTINEL) {
                Evaluation::Achieved
            } else {
                Evaluation::Unparseable("repair plan is empty".into())
            };
        }
        return Evaluation::Repair(plan);
    }

    if trimmed.contains(SUCCESS_SENTINEL) {
        return Evaluation::Achieved;
    }

    let preview: String = trimmed.chars().take(120).collect();
    Evaluation::Unparseable(format!("no sentinel or JSON plan in reply: {preview}"))
}

fn extract_plan(text: &str) -> Option<Vec<RepairTask>> {
    let candidates = [('[', ']'), ('{', '}')];
    for (open, close) in candidates {
        let (Some(start), Some(end)) = (text.find(open), text.rfind(close)) else {
            continue;
        };
        if end <= start {
            continue;
        }
        if let Ok(shape) = serde_json::from_str::<PlanShape>(&text[start..=end]) {
            return Some(match shape {
                PlanShape::List(tasks) | PlanShape::Wrapped { tasks } => tasks,
            });
        }
    }
    None
}

/// Turn a raw plan into scheduler tasks for repair cycle `cycle` (1-based):
/// roles normalized, ids moved into the cycle's namespace, dependencies
/// remapped and references outside the plan dropped.
pub fn namespace_plan(plan: &[RepairTask], cycle: u32) -> Vec<Task> {
    let base = TaskId::from(cycle) * REPAIR_ID_STRIDE;
    if plan.len() > MAX_REPAIR_TASKS {
        tracing::warn!(
            target: "hive.healing",
            planned = plan.len(),
            "repair plan truncated to {MAX_REPAIR_TASKS} tasks"
        );
    }
    let plan = &plan[..plan.len().min(MAX_REPAIR_TASKS)];

    // Valid declared ids are reserved first so a fallback never takes one.
    let mut taken: HashSet<TaskId> = HashSet::with_capacity(plan.len());
    let declared: Vec<Option<TaskId>> = plan
        .iter()
        .map(|entry| {
            entry
                .id
                .filter(|id| (1..REPAIR_ID_STRIDE).contains(id) && taken.insert(*id))
        })
        .collect();

    let mut next_free: TaskId = 1;
    let local_ids: Vec<TaskId> = declared
        .iter()
        .map(|id| match id {
            Some(id) => *id,
            None => {
                while taken.contains(&next_free) {
                    next_free += 1;
                }
                taken.insert(next_free);
                next_free
            }
        })
        .collect();

    let mut remap: HashMap<TaskId, TaskId> = declared
        .iter()
        .zip(&local_ids)
        .filter_map(|(declared, local)| declared.map(|id| (id, base + local)))
        .collect();
    for local in &local_ids {
        remap.entry(*local).or_insert(base + local);
    }

    plan.iter()
        .zip(&local_ids)
        .map(|(entry, local)| {
            let role = entry
                .role
                .as_deref()
                .map(AgentRole::from_alias)
                .unwrap_or_default();
            let dependencies: Vec<TaskId> = entry
                .dependencies
                .iter()
                .filter_map(|dep| {
                    let mapped = remap.get(dep).copied();
                    if mapped.is_none() {
                        tracing::debug!(
                            target: "hive.healing",
                            dep = *dep,
                            "repair dependency outside the plan dropped"
                        );
                    }
                    mapped
                })
                .collect();
            Task::new(base + local, role, entry.description.trim()).with_dependencies(dependencies)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sentinel_means_success() {
        assert_eq!(parse_evaluation("OBJECTIVE_ACHIEVED"), Evaluation::Achieved);
        assert_eq!(
            parse_evaluation("All good.\nOBJECTIVE_ACHIEVED\n"),
            Evaluation::Achieved
        );
    }

    #[test]
    fn fenced_plan_is_parsed() {
        let reply = "Two things are broken:\n```json\n[{\"id\": 1, \"agent\": \"developer\", \"task\": \"fix import\"}, {\"id\": 2, \"role\": \"qa\", \"description\": \"rerun tests\", \"dependencies\": [1]}]\n```";
        match parse_evaluation(reply) {
            Evaluation::Repair(plan) => {
                assert_eq!(plan.len(), 2);
                assert_eq!(plan[0].role.as_deref(), Some("developer"));
                assert_eq!(plan[1].dependencies, vec![1]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wrapped_plan_is_parsed() {
        let reply = r#"{"tasks": [{"task": "add missing file"}]}"#;
        assert!(matches!(parse_evaluation(reply), Evaluation::Repair(p) if p.len() == 1));
    }

    #[test]
    fn prose_is_unparseable() {
        assert!(matches!(
            parse_evaluation("Looks mostly fine but I am unsure."),
            Evaluation::Unparseable(_)
        ));
        assert!(matches!(parse_evaluation("[]"), Evaluation::Unparseable(_)));
    }

    #[test]
    fn ids_are_namespaced_per_cycle() {
        let plan = vec![
            RepairTask {
                id: Some(1),
                role: Some("developer".into()),
                description: "fix import".into(),
                dependencies: vec![],
            },
            RepairTask {
                id: Some(2),
                role: Some("wizard".into()),
                description: "rerun tests".into(),
                dependencies: vec![1, 77],
            },
        ];
        let tasks = namespace_plan(&plan, 2);
        assert_eq!(tasks[0].id, 20_001);
        assert_eq!(tasks[0].role, AgentRole::Coder);
        assert_eq!(tasks[1].id, 20_002);
        assert_eq!(tasks[1].role, AgentRole::General);
        assert_eq!(tasks[1].dependencies, vec![20_001]);
    }

    #[test]
    fn missing_or_duplicate_ids_take_the_next_free_slot() {
        let entry = |id: Option<TaskId>| RepairTask {
            id,
            role: None,
            description: "x".into(),
            dependencies: vec![],
        };
        let tasks = namespace_plan(&[entry(None), entry(Some(1)), entry(Some(1))], 1);
        let ids: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![10_002, 10_001, 10_003]);
    }

    #[test]
    fn unnumbered_task_never_collides_with_a_declared_id() {
        let plan = vec![
            RepairTask {
                id: Some(2),
                role: None,
                description: "patch the parser".into(),
                dependencies: vec![],
            },
            RepairTask {
                id: None,
                role: None,
                description: "rerun the parser tests".into(),
                dependencies: vec![2],
            },
            RepairTask {
                id: Some(20_000),
                role: None,
                description: "update the changelog".into(),
                dependencies: vec![],
            },
        ];
        let tasks = namespace_plan(&plan, 1);
        let ids: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![10_002, 10_001, 10_003]);
        assert_eq!(tasks[1].dependencies, vec![10_002]);
    }
}
