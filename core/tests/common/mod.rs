#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hive_core::api::*;
use hive_core::dispatch::HostPlatform;
use hive_core::executor::cache::ReadCache;
use regex::Regex;
use serde_json::{Map, Value};

pub const ROOT: &str = "/sandbox";

pub fn task(id: TaskId, description: &str, deps: &[TaskId]) -> Task {
    Task::new(id, AgentRole::Coder, description).with_dependencies(deps.iter().copied())
}

pub fn config_with_concurrency(max_concurrency: usize) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.scheduler.max_concurrency = max_concurrency;
    cfg
}

pub fn exec_ctx() -> ExecutionContext {
    ExecutionContext {
        run_id: "test-run".into(),
        wave: 0,
        attempt: 1,
        dependency_context: String::new(),
        read_cache: Arc::new(ReadCache::new(Duration::from_secs(60), 64)),
    }
}

/// Fixed retry budget with no backoff.
pub struct Attempts(pub u32);

impl RetryStrategyPlugin for Attempts {
    fn name(&self) -> &str {
        "attempts"
    }

    fn next_delay(&self, _attempt: u32, _error: &TaskError) -> Option<Duration> {
        Some(Duration::from_millis(1))
    }

    fn max_attempts(&self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(TaskId),
    End(TaskId),
}

/// Succeeds every task after `delay`, recording start/end order, peak
/// parallelism and the dependency context each task saw.
pub struct RecordingExecutor {
    delay: Duration,
    failing: Vec<TaskId>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    events: Mutex<Vec<Event>>,
    contexts: Mutex<HashMap<TaskId, String>>,
}

impl RecordingExecutor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            failing: Vec::new(),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            events: Mutex::new(Vec::new()),
            contexts: Mutex::new(HashMap::new()),
        }
    }

    pub fn failing(mut self, ids: &[TaskId]) -> Self {
        self.failing = ids.to_vec();
        self
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn context_of(&self, id: TaskId) -> Option<String> {
        self.contexts.lock().unwrap().get(&id).cloned()
    }

    pub fn position(&self, event: &Event) -> usize {
        self.events()
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("missing event {event:?}"))
    }
}

#[async_trait]
impl TaskExecutor for RecordingExecutor {
    async fn execute(&self, task: &Task, ctx: &ExecutionContext) -> Result<TaskOutput, TaskError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.events.lock().unwrap().push(Event::Start(task.id));
        self.contexts
            .lock()
            .unwrap()
            .insert(task.id, ctx.dependency_context.clone());

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(Event::End(task.id));

        if self.failing.contains(&task.id) {
            return Err(TaskError::Validation(format!("task {} cannot pass", task.id)));
        }
        Ok(TaskOutput::text(format!("output of task {}", task.id)))
    }
}

/// In-memory filesystem keyed by absolute path. Directories are implied by
/// file paths.
#[derive(Default)]
pub struct MemoryFs {
    files: Mutex<BTreeMap<PathBuf, String>>,
    reads: AtomicUsize,
}

impl MemoryFs {
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let fs = Self::default();
        {
            let mut map = fs.files.lock().unwrap();
            for (path, body) in files {
                map.insert(PathBuf::from(ROOT).join(path), body.to_string());
            }
        }
        fs
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn content(&self, relative: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(&PathBuf::from(ROOT).join(relative))
            .cloned()
    }
}

#[async_trait]
impl Filesystem for MemoryFs {
    async fn read_to_string(&self, path: &Path) -> Result<String, FsError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| FsError::NotFound(path.to_path_buf()))
    }

    async fn write(&self, path: &Path, contents: &str) -> Result<(), FsError> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    async fn list(&self, dir: &Path) -> Result<Vec<String>, FsError> {
        let files = self.files.lock().unwrap();
        let mut names: Vec<String> = files
            .keys()
            .filter_map(|p| p.strip_prefix(dir).ok())
            .filter_map(|rest| {
                let mut parts = rest.components();
                let first = parts.next()?.as_os_str().to_string_lossy().to_string();
                Some(if parts.next().is_some() {
                    format!("{first}/")
                } else {
                    first
                })
            })
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn stat(&self, path: &Path) -> Result<FileStat, FsError> {
        let files = self.files.lock().unwrap();
        if let Some(body) = files.get(path) {
            return Ok(FileStat {
                is_dir: false,
                len: body.len() as u64,
            });
        }
        if files.keys().any(|p| p.starts_with(path)) {
            return Ok(FileStat { is_dir: true, len: 0 });
        }
        Err(FsError::NotFound(path.to_path_buf()))
    }

    async fn glob(&self, pattern: &Path) -> Result<Vec<PathBuf>, FsError> {
        let source = regex::escape(&pattern.to_string_lossy()).replace(r"\*", "[^/]*");
        let re = Regex::new(&format!("^{source}$"))
            .map_err(|e| FsError::Pattern(e.to_string()))?;
        Ok(self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter(|p| re.is_match(&p.to_string_lossy()))
            .cloned()
            .collect())
    }
}

/// Replies from a script, then a default. Counts calls and keeps prompts.
pub struct ScriptedReasoning {
    replies: Mutex<VecDeque<String>>,
    fallback: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedReasoning {
    pub fn new(replies: &[&str], fallback: &str) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            fallback: fallback.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: &str) -> Self {
        Self::new(&[], reply)
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningCall for ScriptedReasoning {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn reason(&self, request: ReasoningRequest) -> Result<String, ReasoningError> {
        self.prompts.lock().unwrap().push(request.prompt);
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Records commands and echoes them back with exit code 0.
#[derive(Default)]
pub struct FakeShell {
    commands: Mutex<Vec<String>>,
}

impl FakeShell {
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShellExec for FakeShell {
    async fn exec(
        &self,
        command: &str,
        _cwd: &Path,
        _timeout: Duration,
    ) -> Result<ShellOutput, ShellError> {
        self.commands.lock().unwrap().push(command.to_string());
        Ok(ShellOutput {
            stdout: format!("ran: {command}"),
            stderr: String::new(),
            exit_code: Some(0),
        })
    }
}

/// Tool registry with a fixed set of echo tools.
#[derive(Default)]
pub struct EchoTools {
    names: Vec<String>,
}

impl EchoTools {
    pub fn with(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ToolCall for EchoTools {
    fn available_tools(&self) -> Vec<String> {
        self.names.clone()
    }

    async fn call(&self, tool: &str, params: &Map<String, Value>) -> Result<Value, ToolCallError> {
        if !self.names.iter().any(|n| n == tool) {
            return Err(ToolCallError::UnknownTool(tool.to_string()));
        }
        Ok(serde_json::json!({ "tool": tool, "params": params }))
    }
}

pub struct Harness {
    pub dispatcher: Arc<Dispatcher>,
    pub fs: Arc<MemoryFs>,
    pub reasoning: Arc<ScriptedReasoning>,
    pub shell: Arc<FakeShell>,
}

pub fn dispatch_config(project_language: Option<&str>) -> DispatchConfig {
    DispatchConfig {
        root: PathBuf::from(ROOT),
        tool_routing_enabled: true,
        allow_shell_metacharacters: false,
        shell_timeout: Duration::from_secs(5),
        reasoning_timeout: Duration::from_secs(5),
        forced_backend: None,
        project_language: project_language.map(str::to_string),
        natural_language: None,
        platform: HostPlatform::Posix,
    }
}

pub fn harness(
    fs: MemoryFs,
    reasoning: ScriptedReasoning,
    tools: EchoTools,
    config: DispatchConfig,
) -> Harness {
    let fs = Arc::new(fs);
    let reasoning = Arc::new(reasoning);
    let shell = Arc::new(FakeShell::default());
    let collaborators = Collaborators {
        reasoning: reasoning.clone(),
        tools: Arc::new(tools),
        fs: fs.clone(),
        shell: shell.clone(),
    };
    Harness {
        dispatcher: Arc::new(Dispatcher::new(collaborators, config)),
        fs,
        reasoning,
        shell,
    }
}
