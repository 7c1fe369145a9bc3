//! Maps a task description (plus optional tool binding) to one routing intent.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use crate::executor::types::ToolBinding;

use super::tools::{normalize_tool_name, remap_params};

#[derive(Debug, Clone, PartialEq)]
pub enum TaskIntent {
    ToolCall {
        name: String,
        params: Map<String, Value>,
    },
    FileRead {
        paths: Vec<String>,
    },
    /// `instructions` drive the reasoning call that produces the content.
    FileWrite {
        paths: Vec<String>,
        instructions: String,
    },
    ShellExec {
        command: String,
    },
    Reason {
        prompt: String,
    },
}

impl TaskIntent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ToolCall { .. } => "tool_call",
            Self::FileRead { .. } => "file_read",
            Self::FileWrite { .. } => "file_write",
            Self::ShellExec { .. } => "shell_exec",
            Self::Reason { .. } => "reason",
        }
    }
}

lazy_static! {
    static ref JUDGMENT: Regex = Regex::new(
        r"(?i)\b(?:analy[sz]e|analysis|repair|refactor|diagnos\w*|debug\w*|review\w*|fix\w*|optimi[sz]e|investigat\w*|explain\w*|improv\w*|design\w*|evaluat\w*|assess\w*|audit\w*)\b"
    )
    .unwrap();

    static ref TOOL_PHRASE: Regex = Regex::new(
        r#"(?i)\b(?:use|call|invoke|run)\s+(?:the\s+)?(?:tool\s+)?[`'"]?([a-z][\w.-]*)[`'"]?\s+tool\b"#
    )
    .unwrap();
    static ref TOOL_PREFIX: Regex = Regex::new(r#"(?i)\btool\s*:\s*[`'"]?([a-z][\w.-]*)"#).unwrap();
    static ref MCP_NAME: Regex = Regex::new(r"\b(mcp__[\w-]+__[\w-]+)\b").unwrap();
    static ref JSON_OBJECT: Regex = Regex::new(r"(?s)\{.*\}").unwrap();

    static ref SHELL: Regex = Regex::new(
        r"(?i)^\s*(?:run|execute)(?:\s+(?:the\s+)?(?:shell\s+)?command)?\s*:?\s*`([^`]+)`\s*\.?\s*$"
    )
    .unwrap();
    static ref LIST: Regex = Regex::new(
        r"(?i)^\s*(?:list|show)\s+(?:all\s+)?(?:the\s+)?(?:files|contents|entries)?\s*(?:in|of|under|inside)?\s*(?:the\s+)?(?:directory|folder|dir)?\s+(\S+)\s*$"
    )
    .unwrap();
    static ref READ: Regex = Regex::new(
        r"(?i)^\s*(?:read|open|cat|display|print|show)\s+(?:the\s+)?(?:contents?\s+of\s+)?(?:the\s+)?(?:files?\s+)?(.+)$"
    )
    .unwrap();
    static ref WRITE: Regex = Regex::new(
        r"(?i)^\s*(?:write|create|save|generate)\s+(?:a\s+|an\s+|the\s+|new\s+)*(?:\w+\s+)?(?:file\s+)?(?:named\s+|called\s+|at\s+|to\s+)?([\w./\\-]+\.[A-Za-z0-9]+)\b"
    )
    .unwrap();
    static ref PATH_TOKEN: Regex =
        Regex::new(r"[\w./\\*-]*[\w*-]\.[A-Za-z0-9]+|[\w.*-]*/[\w./*-]*").unwrap();
}

/// Resolution order: explicit binding, tool phrasing, simple file/shell
/// operation, then `Reason`.
#[derive(Debug, Clone, Default)]
pub struct TaskIntentClassifier {
    tool_routing_enabled: bool,
    known_tools: Vec<String>,
}

impl TaskIntentClassifier {
    pub fn new(tool_routing_enabled: bool) -> Self {
        Self {
            tool_routing_enabled,
            known_tools: Vec::new(),
        }
    }

    /// Restrict free-text tool references to tools the registry exposes.
    pub fn with_known_tools(mut self, tools: impl IntoIterator<Item = String>) -> Self {
        self.known_tools = tools
            .into_iter()
            .map(|t| normalize_tool_name(&t))
            .collect();
        self
    }

    pub fn classify(&self, description: &str, binding: Option<&ToolBinding>) -> TaskIntent {
        if let Some(binding) = binding {
            let name = normalize_tool_name(&binding.name);
            let params = remap_params(&name, &binding.params);
            return TaskIntent::ToolCall { name, params };
        }

        if self.tool_routing_enabled {
            if let Some(intent) = self.tool_reference(description) {
                return intent;
            }
        }

        if requires_judgment(description) {
            return TaskIntent::Reason {
                prompt: description.to_string(),
            };
        }

        simple_operation(description).unwrap_or_else(|| TaskIntent::Reason {
            prompt: description.to_string(),
        })
    }

    fn tool_reference(&self, description: &str) -> Option<TaskIntent> {
        let raw = MCP_NAME
            .captures(description)
            .or_else(|| TOOL_PHRASE.captures(description))
            .or_else(|| TOOL_PREFIX.captures(description))?
            .get(1)?
            .as_str();

        let name = normalize_tool_name(raw);
        if !self.known_tools.is_empty() && !self.known_tools.contains(&name) {
            tracing::debug!(
                target: "hive.dispatch",
                tool = %name,
                "tool reference ignored: not registered"
            );
            return None;
        }

        let params = JSON_OBJECT
            .find(description)
            .and_then(|m| serde_json::from_str::<Map<String, Value>>(m.as_str()).ok())
            .unwrap_or_default();
        let params = remap_params(&name, &params);
        Some(TaskIntent::ToolCall { name, params })
    }
}

/// Analysis, repair, refactoring and similar never take the fast path.
pub fn requires_judgment(description: &str) -> bool {
    JUDGMENT.is_match(description)
}

/// Plain list/read/write/run requests that need no reasoning to route.
pub fn simple_operation(description: &str) -> Option<TaskIntent> {
    let line = description.trim();
    if line.contains('\n') {
        return None;
    }

    if let Some(caps) = SHELL.captures(line) {
        return Some(TaskIntent::ShellExec {
            command: caps[1].trim().to_string(),
        });
    }

    if let Some(caps) = WRITE.captures(line) {
        return Some(TaskIntent::FileWrite {
            paths: vec![caps[1].to_string()],
            instructions: description.to_string(),
        });
    }

    if let Some(caps) = LIST.captures(line) {
        let target = caps[1].to_string();
        if looks_like_path(&target) {
            return Some(TaskIntent::FileRead {
                paths: vec![target],
            });
        }
    }

    if let Some(caps) = READ.captures(line) {
        let paths = extract_paths(&caps[1]);
        if !paths.is_empty() {
            return Some(TaskIntent::FileRead { paths });
        }
    }

    None
}

fn looks_like_path(token: &str) -> bool {
    token == "." || token.contains('/') || token.contains('\\') || PATH_TOKEN.is_match(token)
}

fn extract_paths(text: &str) -> Vec<String> {
    PATH_TOKEN
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches('.').to_string())
        .filter(|p| !p.is_empty())
        .collect()
}
