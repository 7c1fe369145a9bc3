use crate::executor::context::apply_dependency_context;
use crate::executor::types::Task;

use super::validator::InvalidReason;

const DIRECTIVE_GUIDE: &str = "\
When an action is needed, use these directives on their own lines:
EXEC: <shell command>
[WRITE: <relative path>]
<complete file content>
[/WRITE]
Produce the artifact itself, not a description of what you intend to do.";

/// Builds prompts for reasoning calls.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    project_language: Option<String>,
    natural_language: Option<String>,
}

impl PromptBuilder {
    pub fn new(project_language: Option<String>, natural_language: Option<String>) -> Self {
        Self {
            project_language,
            natural_language,
        }
    }

    /// Persona, project constraints, dependency context, then the task.
    pub fn task_prompt(&self, task: &Task, body: &str, dependency_context: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str(task.role.persona());
        prompt.push('\n');

        if let Some(lang) = &self.project_language {
            prompt.push_str(&format!(
                "The project is written in {lang}. Any code you produce must be {lang}.\n"
            ));
        }
        if let Some(lang) = &self.natural_language {
            prompt.push_str(&format!("Write prose in language `{lang}`.\n"));
        }
        prompt.push('\n');
        prompt.push_str(DIRECTIVE_GUIDE);
        prompt.push_str("\n\n");

        let task_block = format!("# Task {}\n{}", task.id, body.trim());
        prompt.push_str(&apply_dependency_context(&task_block, dependency_context));
        prompt
    }

    /// Prompt that asks for the content of a single file.
    pub fn file_content_prompt(
        &self,
        task: &Task,
        path: &str,
        existing: Option<&str>,
        dependency_context: &str,
    ) -> String {
        let mut body = format!(
            "{}\n\nReturn only the complete content of `{path}`. No explanation, no directives.",
            task.description.trim()
        );
        if let Some(existing) = existing {
            body.push_str(&format!("\n\nCurrent content of `{path}`:\n{existing}"));
        }

        let mut prompt = String::new();
        prompt.push_str(task.role.persona());
        prompt.push('\n');
        if let Some(lang) = &self.project_language {
            prompt.push_str(&format!("The project is written in {lang}.\n"));
        }
        prompt.push('\n');
        prompt.push_str(&apply_dependency_context(&body, dependency_context));
        prompt
    }

    /// Original prompt plus an explicit correction for a language mismatch.
    pub fn corrective_prompt(&self, original: &str, reason: &InvalidReason) -> String {
        let instruction = match reason {
            InvalidReason::LanguageMismatch { expected, detected } => format!(
                "Your previous answer was written in {detected}. This project uses {expected}. \
                 Answer again using only {expected}."
            ),
            other => format!("Your previous answer was rejected: {other}. Answer again."),
        };
        format!("{original}\n\nCORRECTION: {instruction}")
    }
}
