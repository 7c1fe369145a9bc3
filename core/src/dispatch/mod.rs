//! Routed execution of a single task attempt.
//!
//! ```text
//! Task ─▶ TaskIntentClassifier ─┬─ ToolCall  ─▶ builtin file/shell tools | ToolCall collaborator
//!                               ├─ FileRead  ─▶ PathGuard ─▶ ReadCache ─▶ Filesystem
//!                               ├─ FileWrite ─▶ reasoning (validated) ─▶ PathGuard ─▶ Filesystem
//!                               ├─ ShellExec ─▶ CommandPolicy ─▶ CommandTranslator ─▶ ShellExec
//!                               └─ Reason    ─▶ reasoning (validated) ─▶ directives ─▶ same paths
//! ```

pub mod command;
pub mod directive;
pub mod intent;
pub mod path_guard;
pub mod prompt;
pub mod tools;
pub mod validator;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::backend::{Collaborators, ReasoningErrorKind, ReasoningRequest, ShellError};
use crate::config::{resolve_sandbox_root, AppConfig};
use crate::error::{ConfigError, TaskError};
use crate::executor::cache::ReadCache;
use crate::executor::traits::{ExecutionContext, TaskExecutor};
use crate::executor::types::{Task, TaskOutput};

pub use command::{CommandPolicy, CommandTranslator, HostPlatform};
pub use directive::{has_actions, parse_directives, Directive};
pub use intent::{TaskIntent, TaskIntentClassifier};
pub use path_guard::{GuardedPath, PathGuard};
pub use prompt::PromptBuilder;
pub use validator::{InvalidReason, ResponseValidator, Verdict};

/// Extensions the write path refuses to create or overwrite.
const BLOCKED_WRITE_EXTENSIONS: &[&str] = &["exe", "dll", "bat", "cmd", "ps1", "sh", "msi"];

/// Upper bound on files pulled in by one glob read.
const MAX_GLOB_FILES: usize = 50;

/// Tool a registry may expose for reading external resources.
pub const FETCH_URL_TOOL: &str = "fetch_url";

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub root: PathBuf,
    pub tool_routing_enabled: bool,
    pub allow_shell_metacharacters: bool,
    pub shell_timeout: Duration,
    pub reasoning_timeout: Duration,
    pub forced_backend: Option<String>,
    pub project_language: Option<String>,
    pub natural_language: Option<String>,
    pub platform: HostPlatform,
}

impl DispatchConfig {
    pub fn from_app_config(cfg: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            root: resolve_sandbox_root(&cfg.sandbox.root)?,
            tool_routing_enabled: cfg.routing.tool_routing_enabled,
            allow_shell_metacharacters: cfg.sandbox.allow_shell_metacharacters,
            shell_timeout: cfg.sandbox.shell_timeout(),
            reasoning_timeout: cfg.reasoning.timeout(),
            forced_backend: cfg.reasoning.forced_backend.clone(),
            project_language: cfg.project.language.clone(),
            natural_language: cfg.project.natural_language.clone(),
            platform: HostPlatform::current(),
        })
    }
}

/// Reasoning output after validation and the optional corrective retry.
enum Checked {
    Accepted(String),
    Rejected(InvalidReason),
}

/// [`TaskExecutor`] that classifies each task and runs it through the
/// sandboxed file, shell, tool or reasoning path.
pub struct Dispatcher {
    collaborators: Collaborators,
    config: DispatchConfig,
    guard: PathGuard,
    policy: CommandPolicy,
    translator: CommandTranslator,
    classifier: TaskIntentClassifier,
    validator: ResponseValidator,
    prompts: PromptBuilder,
}

impl Dispatcher {
    pub fn new(collaborators: Collaborators, config: DispatchConfig) -> Self {
        let mut known_tools: Vec<String> = [
            tools::READ_FILE,
            tools::WRITE_FILE,
            tools::LIST_DIRECTORY,
            tools::RUN_COMMAND,
        ]
        .iter()
        .map(|t| t.to_string())
        .collect();
        known_tools.extend(collaborators.tools.available_tools());

        Self {
            guard: PathGuard::new(config.root.clone()),
            policy: CommandPolicy::new(config.allow_shell_metacharacters),
            translator: CommandTranslator::new(config.platform),
            classifier: TaskIntentClassifier::new(config.tool_routing_enabled)
                .with_known_tools(known_tools),
            validator: ResponseValidator::new(
                config.project_language.as_deref(),
                config.natural_language.as_deref(),
            ),
            prompts: PromptBuilder::new(
                config.project_language.clone(),
                config.natural_language.clone(),
            ),
            collaborators,
            config,
        }
    }

    pub fn guard(&self) -> &PathGuard {
        &self.guard
    }

    pub fn classifier(&self) -> &TaskIntentClassifier {
        &self.classifier
    }

    async fn dispatch(
        &self,
        intent: TaskIntent,
        task: &Task,
        ctx: &ExecutionContext,
    ) -> Result<TaskOutput, TaskError> {
        match intent {
            TaskIntent::Reason { prompt } => self.run_reason(task, &prompt, ctx).await,
            other => self.dispatch_direct(other, task, ctx).await,
        }
    }

    /// Every intent except `Reason`.
    async fn dispatch_direct(
        &self,
        intent: TaskIntent,
        task: &Task,
        ctx: &ExecutionContext,
    ) -> Result<TaskOutput, TaskError> {
        match intent {
            TaskIntent::ToolCall { name, params } => self.run_tool(&name, &params, ctx).await,
            TaskIntent::FileRead { paths } => self.read_paths(&paths, &ctx.read_cache).await,
            TaskIntent::FileWrite { paths, .. } => self.generate_files(task, &paths, ctx).await,
            TaskIntent::ShellExec { command } => {
                let text = self.run_shell(&command).await?;
                Ok(TaskOutput::text(text).with_payload(json!({ "command": command })))
            }
            TaskIntent::Reason { .. } => Err(TaskError::Execution(
                "reasoning intent cannot be dispatched directly".into(),
            )),
        }
    }

    async fn run_tool(
        &self,
        name: &str,
        params: &Map<String, Value>,
        ctx: &ExecutionContext,
    ) -> Result<TaskOutput, TaskError> {
        match name {
            tools::READ_FILE | tools::LIST_DIRECTORY => {
                let path = string_param(name, params, "path")?;
                self.read_paths(&[path], &ctx.read_cache).await
            }
            tools::WRITE_FILE => {
                let path = string_param(name, params, "path")?;
                let content = string_param(name, params, "content")?;
                let written = self
                    .write_guarded(&path, &content, &ctx.read_cache)
                    .await?;
                Ok(TaskOutput::text(format!(
                    "Wrote {} bytes to {}",
                    content.len(),
                    written.display()
                )))
            }
            tools::RUN_COMMAND => {
                let command = string_param(name, params, "command")?;
                let text = self.run_shell(&command).await?;
                Ok(TaskOutput::text(text))
            }
            _ => {
                let value = self
                    .collaborators
                    .tools
                    .call(name, params)
                    .await
                    .map_err(|e| TaskError::Tool {
                        tool: name.to_string(),
                        message: e.to_string(),
                    })?;
                let text = match &value {
                    Value::String(s) => s.clone(),
                    other => serde_json::to_string_pretty(other).unwrap_or_default(),
                };
                Ok(TaskOutput::text(text).with_payload(value))
            }
        }
    }

    async fn read_paths(
        &self,
        candidates: &[String],
        cache: &ReadCache,
    ) -> Result<TaskOutput, TaskError> {
        let mut sections: Vec<(String, String)> = Vec::new();

        for candidate in candidates {
            match self.guard.validate(candidate) {
                None => {
                    return Err(TaskError::Validation(format!(
                        "path `{candidate}` is outside the sandbox root {}",
                        self.guard.root().display()
                    )))
                }
                Some(GuardedPath::External(url)) => {
                    let body = self.read_external(&url).await?;
                    sections.push((url, body));
                }
                Some(GuardedPath::Local(path)) if is_glob(&path) => {
                    for file in self.expand_glob(&path).await? {
                        let body = self.read_local(&file, cache).await?;
                        sections.push((file.display().to_string(), body));
                    }
                }
                Some(GuardedPath::Local(path)) => {
                    let body = self.read_local(&path, cache).await?;
                    sections.push((path.display().to_string(), body));
                }
            }
        }

        let paths: Vec<&str> = sections.iter().map(|(p, _)| p.as_str()).collect();
        let payload = json!({ "paths": paths });
        let primary = match sections.as_slice() {
            [(_, body)] => body.clone(),
            many => many
                .iter()
                .map(|(path, body)| format!("=== {path} ===\n{body}"))
                .collect::<Vec<_>>()
                .join("\n"),
        };
        Ok(TaskOutput::text(primary).with_payload(payload))
    }

    async fn read_local(&self, path: &Path, cache: &ReadCache) -> Result<String, TaskError> {
        if let Some(hit) = cache.get(path) {
            tracing::debug!(target: "hive.dispatch", path = %path.display(), "read cache hit");
            return Ok(hit);
        }

        let fs = &self.collaborators.fs;
        let stat = fs.stat(path).await.map_err(fs_error)?;
        let body = if stat.is_dir {
            fs.list(path).await.map_err(fs_error)?.join("\n")
        } else {
            fs.read_to_string(path).await.map_err(fs_error)?
        };

        cache.put(path.to_path_buf(), body.clone());
        Ok(body)
    }

    async fn read_external(&self, url: &str) -> Result<String, TaskError> {
        let tools = &self.collaborators.tools;
        if !tools
            .available_tools()
            .iter()
            .any(|t| t.as_str() == FETCH_URL_TOOL)
        {
            return Ok(format!("external reference: {url}"));
        }

        let mut params = Map::new();
        params.insert("url".into(), Value::String(url.to_string()));
        let value = tools
            .call(FETCH_URL_TOOL, &params)
            .await
            .map_err(|e| TaskError::Tool {
                tool: FETCH_URL_TOOL.into(),
                message: e.to_string(),
            })?;
        Ok(match value {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    async fn expand_glob(&self, pattern: &Path) -> Result<Vec<PathBuf>, TaskError> {
        let mut matches = self
            .collaborators
            .fs
            .glob(pattern)
            .await
            .map_err(fs_error)?;
        matches.retain(|p| p.starts_with(self.guard.root()));
        if matches.len() > MAX_GLOB_FILES {
            tracing::warn!(
                target: "hive.dispatch",
                pattern = %pattern.display(),
                matched = matches.len(),
                "glob truncated to {MAX_GLOB_FILES} files"
            );
            matches.truncate(MAX_GLOB_FILES);
        }
        Ok(matches)
    }

    async fn write_guarded(
        &self,
        candidate: &str,
        content: &str,
        cache: &ReadCache,
    ) -> Result<PathBuf, TaskError> {
        let path = self.guard.validate_local(candidate)?;
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if BLOCKED_WRITE_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
                return Err(TaskError::Validation(format!(
                    "refusing to write executable file type `.{ext}`"
                )));
            }
        }

        self.collaborators
            .fs
            .write(&path, content)
            .await
            .map_err(fs_error)?;
        // Cached listings of every enclosing directory are stale now too.
        for stale in path
            .ancestors()
            .take_while(|p| p.starts_with(self.guard.root()))
        {
            cache.invalidate(stale);
        }
        tracing::debug!(
            target: "hive.dispatch",
            path = %path.display(),
            bytes = content.len(),
            "file written"
        );
        Ok(path)
    }

    async fn generate_files(
        &self,
        task: &Task,
        paths: &[String],
        ctx: &ExecutionContext,
    ) -> Result<TaskOutput, TaskError> {
        let mut primary = String::new();
        let mut written = Vec::new();

        for candidate in paths {
            let path = self.guard.validate_local(candidate)?;
            let existing = self
                .collaborators
                .fs
                .read_to_string(&path)
                .await
                .ok();
            let prompt = self.prompts.file_content_prompt(
                task,
                candidate,
                existing.as_deref(),
                &ctx.dependency_context,
            );

            let content = match self.reason_checked(task, &prompt).await? {
                Checked::Accepted(text) => directive::strip_code_fence(&text),
                Checked::Rejected(reason) => {
                    return Err(TaskError::InvalidResponse(reason.to_string()))
                }
            };

            let path = self
                .write_guarded(candidate, &content, &ctx.read_cache)
                .await?;
            primary.push_str(&format!("# {}\n{}", path.display(), content));
            written.push(path.display().to_string());
        }

        let mut output = TaskOutput::text(primary).with_payload(json!({ "written": written }));
        for path in &written {
            output.push_log(format!("wrote {path}"));
        }
        Ok(output)
    }

    async fn run_shell(&self, command: &str) -> Result<String, TaskError> {
        self.policy.check(command)?;
        let translated = self.translator.translate(command);

        let out = self
            .collaborators
            .shell
            .exec(&translated, self.guard.root(), self.config.shell_timeout)
            .await
            .map_err(|e| match e {
                ShellError::Timeout(ms) => TaskError::Timeout(ms),
                other => TaskError::Execution(other.to_string()),
            })?;

        if !out.success() {
            let code = out
                .exit_code
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(TaskError::Execution(format!(
                "command `{translated}` exited with {code}: {}",
                tail(&out.stderr, 500)
            )));
        }

        let mut text = out.stdout;
        if !out.stderr.trim().is_empty() {
            text.push_str("\n[stderr]\n");
            text.push_str(&out.stderr);
        }
        Ok(text)
    }

    async fn call_reasoning(&self, prompt: &str) -> Result<String, TaskError> {
        let request = ReasoningRequest::new(prompt, self.config.reasoning_timeout)
            .with_backend(self.config.forced_backend.clone());
        self.collaborators
            .reasoning
            .reason(request)
            .await
            .map_err(|e| match e.kind {
                ReasoningErrorKind::Timeout => {
                    TaskError::Timeout(self.config.reasoning_timeout.as_millis() as u64)
                }
                _ => TaskError::Execution(e.to_string()),
            })
    }

    /// One reasoning call plus, on a language mismatch only, exactly one
    /// corrective call. A second mismatch is a hallucination.
    async fn reason_checked(&self, task: &Task, prompt: &str) -> Result<Checked, TaskError> {
        let text = self.call_reasoning(prompt).await?;
        let reason = match self.validator.validate(&text, task) {
            Verdict::Valid => return Ok(Checked::Accepted(text)),
            Verdict::Invalid(reason) if reason.is_language_mismatch() => reason,
            Verdict::Invalid(reason) => {
                tracing::warn!(target: "hive.dispatch", task_id = task.id, "response rejected: {reason}");
                return Ok(Checked::Rejected(reason));
            }
        };

        tracing::warn!(
            target: "hive.dispatch",
            task_id = task.id,
            "language mismatch, issuing corrective retry: {reason}"
        );
        let corrected = self.prompts.corrective_prompt(prompt, &reason);
        let text = self.call_reasoning(&corrected).await?;
        match self.validator.validate(&text, task) {
            Verdict::Valid => Ok(Checked::Accepted(text)),
            Verdict::Invalid(reason) if reason.is_language_mismatch() => {
                Err(TaskError::Hallucination(reason.to_string()))
            }
            Verdict::Invalid(reason) => Ok(Checked::Rejected(reason)),
        }
    }

    async fn run_reason(
        &self,
        task: &Task,
        body: &str,
        ctx: &ExecutionContext,
    ) -> Result<TaskOutput, TaskError> {
        let prompt = self.prompts.task_prompt(task, body, &ctx.dependency_context);

        let text = match self.reason_checked(task, &prompt).await? {
            Checked::Accepted(text) => text,
            Checked::Rejected(reason @ InvalidReason::TooShort { .. }) => {
                return match intent::simple_operation(&task.description) {
                    Some(fallback) => {
                        tracing::debug!(
                            target: "hive.dispatch",
                            task_id = task.id,
                            intent = fallback.kind(),
                            "short response, falling back to direct operation"
                        );
                        self.dispatch_direct(fallback, task, ctx).await
                    }
                    None => Err(TaskError::InvalidResponse(reason.to_string())),
                };
            }
            Checked::Rejected(reason) => return Err(TaskError::InvalidResponse(reason.to_string())),
        };

        let directives = parse_directives(&text);
        if !has_actions(&directives) {
            tracing::debug!(target: "hive.dispatch", task_id = task.id, "reply carries no directives");
            return Ok(TaskOutput::text(text));
        }

        let mut output = TaskOutput::text(text.clone());
        let mut commands = Vec::new();
        let mut writes = Vec::new();

        for directive in directives {
            match directive {
                Directive::ExecCommand(command) => {
                    let result = self.run_shell(&command).await?;
                    output.push_log(format!("$ {command}\n{result}"));
                    commands.push(command);
                }
                Directive::WriteFile { path, content } => {
                    let written = self
                        .write_guarded(&path, &content, &ctx.read_cache)
                        .await?;
                    output.push_log(format!("wrote {}", written.display()));
                    writes.push(written.display().to_string());
                }
                Directive::PlainText(_) => {}
            }
        }

        Ok(output.with_payload(json!({ "commands": commands, "writes": writes })))
    }
}

#[async_trait]
impl TaskExecutor for Dispatcher {
    async fn execute(&self, task: &Task, ctx: &ExecutionContext) -> Result<TaskOutput, TaskError> {
        let intent = self.classifier.classify(&task.description, task.tool.as_ref());
        tracing::debug!(
            target: "hive.dispatch",
            task_id = task.id,
            role = task.role.as_str(),
            intent = intent.kind(),
            attempt = ctx.attempt,
            "task routed"
        );
        self.dispatch(intent, task, ctx).await
    }
}

fn string_param(tool: &str, params: &Map<String, Value>, key: &str) -> Result<String, TaskError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| TaskError::Tool {
            tool: tool.to_string(),
            message: format!("missing string parameter `{key}`"),
        })
}

fn is_glob(path: &Path) -> bool {
    path.to_str()
        .is_some_and(|s| s.contains(['*', '?', '[']))
}

fn fs_error(err: crate::backend::FsError) -> TaskError {
    TaskError::Execution(err.to_string())
}

fn tail(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text.trim();
    }
    let skip = count - max_chars;
    let idx = text
        .char_indices()
        .nth(skip)
        .map_or(0, |(idx, _)| idx);
    text[idx..].trim()
}
