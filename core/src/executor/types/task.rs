use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Task identifier, unique within one graph run.
pub type TaskId = u64;

/// Executor persona a task is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum AgentRole {
    Planner,
    Architect,
    Coder,
    Tester,
    Reviewer,
    Debugger,
    Researcher,
    Writer,
    DevOps,
    Security,
    #[default]
    General,
}

impl AgentRole {
    pub const ALL: [AgentRole; 11] = [
        AgentRole::Planner,
        AgentRole::Architect,
        AgentRole::Coder,
        AgentRole::Tester,
        AgentRole::Reviewer,
        AgentRole::Debugger,
        AgentRole::Researcher,
        AgentRole::Writer,
        AgentRole::DevOps,
        AgentRole::Security,
        AgentRole::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::Architect => "architect",
            Self::Coder => "coder",
            Self::Tester => "tester",
            Self::Reviewer => "reviewer",
            Self::Debugger => "debugger",
            Self::Researcher => "researcher",
            Self::Writer => "writer",
            Self::DevOps => "dev_ops",
            Self::Security => "security",
            Self::General => "general",
        }
    }

    /// Best-effort mapping from free-text role names. Unknown names fall back
    /// to [`AgentRole::General`].
    pub fn from_alias(name: &str) -> Self {
        let normalized = name
            .trim()
            .to_lowercase()
            .replace(['-', ' '], "_");

        match normalized.as_str() {
            "planner" | "plan" | "coordinator" | "orchestrator" | "manager" => Self::Planner,
            "architect" | "designer" | "system_designer" => Self::Architect,
            "coder" | "developer" | "dev" | "engineer" | "programmer" | "implementer" => {
                Self::Coder
            }
            "tester" | "test" | "qa" | "quality_assurance" => Self::Tester,
            "reviewer" | "review" | "critic" | "auditor" => Self::Reviewer,
            "debugger" | "debug" | "fixer" | "repair" => Self::Debugger,
            "researcher" | "research" | "analyst" | "investigator" => Self::Researcher,
            "writer" | "docs" | "documenter" | "technical_writer" => Self::Writer,
            "dev_ops" | "devops" | "ops" | "sre" | "deployer" => Self::DevOps,
            "security" | "secops" | "pentester" => Self::Security,
            _ => Self::General,
        }
    }

    /// One-line persona used to frame reasoning prompts.
    pub fn persona(self) -> &'static str {
        match self {
            Self::Planner => "You break objectives into concrete, ordered steps.",
            Self::Architect => "You design module boundaries, interfaces and data flow.",
            Self::Coder => "You write complete, working source code.",
            Self::Tester => "You write and run tests and report exact failures.",
            Self::Reviewer => "You review changes for correctness and regressions.",
            Self::Debugger => "You diagnose failures from evidence and fix root causes.",
            Self::Researcher => "You gather and summarize facts relevant to the task.",
            Self::Writer => "You write clear technical documentation.",
            Self::DevOps => "You handle builds, environments and deployment scripts.",
            Self::Security => "You look for vulnerabilities and unsafe behavior.",
            Self::General => "You are a careful general-purpose engineering assistant.",
        }
    }
}

impl From<String> for AgentRole {
    fn from(value: String) -> Self {
        Self::from_alias(&value)
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit binding of a task to a structured tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolBinding {
    pub name: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// A unit of work in the task graph. Read-only input to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,

    #[serde(default, alias = "agent")]
    pub role: AgentRole,

    #[serde(alias = "task")]
    pub description: String,

    #[serde(default)]
    pub dependencies: Vec<TaskId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolBinding>,
}

impl Task {
    pub fn new(id: TaskId, role: AgentRole, description: impl Into<String>) -> Self {
        Self {
            id,
            role,
            description: description.into(),
            dependencies: Vec::new(),
            tool: None,
        }
    }

    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies = dependencies.into_iter().collect();
        self
    }

    pub fn with_tool(mut self, binding: ToolBinding) -> Self {
        self.tool = Some(binding);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_aliases_map_to_known_roles() {
        assert_eq!(AgentRole::from_alias("Developer"), AgentRole::Coder);
        assert_eq!(AgentRole::from_alias("qa"), AgentRole::Tester);
        assert_eq!(AgentRole::from_alias("Dev-Ops"), AgentRole::DevOps);
        assert_eq!(AgentRole::from_alias("wizard"), AgentRole::General);
    }

    #[test]
    fn task_deserializes_with_aliases() {
        let task: Task = serde_json::from_str(
            r#"{"id": 3, "agent": "reviewer", "task": "review the diff", "dependencies": [1, 2]}"#,
        )
        .unwrap();
        assert_eq!(task.role, AgentRole::Reviewer);
        assert_eq!(task.description, "review the diff");
        assert_eq!(task.dependencies, vec![1, 2]);
        assert!(task.tool.is_none());
    }

    #[test]
    fn role_serializes_snake_case() {
        let json = serde_json::to_string(&AgentRole::DevOps).unwrap();
        assert_eq!(json, "\"dev_ops\"");
    }
}
