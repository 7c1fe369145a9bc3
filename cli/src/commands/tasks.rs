use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use hive_core::api::Task;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TaskFileShape {
    List(Vec<Task>),
    Document {
        tasks: Vec<Task>,
        #[serde(default)]
        objective: Option<String>,
    },
}

#[derive(Debug)]
pub struct TaskFile {
    pub tasks: Vec<Task>,
    pub objective: Option<String>,
}

impl TaskFile {
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        Ok(match serde_json::from_str::<TaskFileShape>(raw)? {
            TaskFileShape::List(tasks) => Self {
                tasks,
                objective: None,
            },
            TaskFileShape::Document { tasks, objective } => Self { tasks, objective },
        })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read task file {}", path.display()))?;
        let file = Self::parse(&raw)
            .with_context(|| format!("parse task file {}", path.display()))?;
        tracing::debug!(
            target: "hive.cli",
            path = %path.display(),
            tasks = file.tasks.len(),
            "task file loaded"
        );
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_core::api::AgentRole;

    #[test]
    fn bare_list() {
        let file = TaskFile::parse(
            r#"[{"id": 1, "agent": "developer", "task": "read src/main.ts"},
                {"id": 2, "role": "qa", "description": "run `npm test`", "dependencies": [1]}]"#,
        )
        .unwrap();
        assert_eq!(file.tasks.len(), 2);
        assert_eq!(file.tasks[0].role, AgentRole::Coder);
        assert_eq!(file.tasks[1].dependencies, vec![1]);
        assert!(file.objective.is_none());
    }

    #[test]
    fn document_with_objective() {
        let file = TaskFile::parse(
            r#"{"objective": "tests pass", "tasks": [{"id": 1, "task": "list src"}]}"#,
        )
        .unwrap();
        assert_eq!(file.objective.as_deref(), Some("tests pass"));
        assert_eq!(file.tasks[0].role, AgentRole::General);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = TaskFile::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.downcast_ref::<std::io::Error>().is_some());
    }
}
