use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub sandbox: SandboxConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub reasoning: ReasoningConfig,

    #[serde(default)]
    pub project: ProjectConfig,

    #[serde(default)]
    pub healing: HealingConfig,
}

impl AppConfig {
    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scheduler;
        if s.max_concurrency == 0 {
            return Err(ConfigError::invalid(
                "scheduler.max_concurrency",
                "must be at least 1",
            ));
        }
        if s.aggressive_concurrency == 0 {
            return Err(ConfigError::invalid(
                "scheduler.aggressive_concurrency",
                "must be at least 1",
            ));
        }
        if s.task_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "scheduler.task_timeout_secs",
                "must be at least 1",
            ));
        }
        if s.max_iterations == 0 {
            return Err(ConfigError::invalid(
                "scheduler.max_iterations",
                "must be at least 1",
            ));
        }
        if s.retry_base_delay_ms > s.retry_max_delay_ms {
            return Err(ConfigError::invalid(
                "scheduler.retry_base_delay_ms",
                "must not exceed retry_max_delay_ms",
            ));
        }
        if self.sandbox.root.trim().is_empty() {
            return Err(ConfigError::invalid("sandbox.root", "must not be empty"));
        }
        if self.sandbox.read_cache_capacity == 0 {
            return Err(ConfigError::invalid(
                "sandbox.read_cache_capacity",
                "must be at least 1",
            ));
        }
        if self.reasoning.timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "reasoning.timeout_secs",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "hive_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

/// What the scheduler does when no task is eligible but tasks remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlockPolicy {
    /// Fail every remaining task with a validation error.
    FailFast,
    /// Clear the dependency lists of every remaining task.
    #[default]
    ForceClearAll,
    /// Drop unknown dependency ids, then clear only the edges of one detected cycle.
    ForceClearCycle,
}

impl DeadlockPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FailFast => "fail_fast",
            Self::ForceClearAll => "force_clear_all",
            Self::ForceClearCycle => "force_clear_cycle",
        }
    }
}

impl FromStr for DeadlockPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fail_fast" => Ok(Self::FailFast),
            "force_clear_all" | "clear_all" => Ok(Self::ForceClearAll),
            "force_clear_cycle" | "clear_cycle" => Ok(Self::ForceClearCycle),
            other => Err(ConfigError::invalid(
                "scheduler.deadlock_policy",
                format!("unknown policy `{other}`"),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Conservative concurrency ceiling.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Use `aggressive_concurrency` instead of `max_concurrency`.
    #[serde(default)]
    pub aggressive: bool,

    #[serde(default = "default_aggressive_concurrency")]
    pub aggressive_concurrency: usize,

    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// "exponential-backoff" or "linear"
    #[serde(default = "default_retry_strategy")]
    pub retry_strategy: String,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// "fixed" or "adaptive"
    #[serde(default = "default_concurrency_strategy")]
    pub concurrency_strategy: String,

    /// Guard against runaway wave loops.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default)]
    pub deadlock_policy: DeadlockPolicy,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_aggressive_concurrency() -> usize {
    12
}

fn default_task_timeout_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_strategy() -> String {
    "exponential-backoff".to_string()
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    8_000
}

fn default_concurrency_strategy() -> String {
    "fixed".to_string()
}

fn default_max_iterations() -> usize {
    100
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            aggressive: false,
            aggressive_concurrency: default_aggressive_concurrency(),
            task_timeout_secs: default_task_timeout_secs(),
            max_retries: default_max_retries(),
            retry_strategy: default_retry_strategy(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            concurrency_strategy: default_concurrency_strategy(),
            max_iterations: default_max_iterations(),
            deadlock_policy: DeadlockPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    /// The higher-ceiling preset.
    pub fn aggressive() -> Self {
        Self {
            aggressive: true,
            ..Self::default()
        }
    }

    /// Effective concurrency ceiling for the selected preset.
    pub fn concurrency_ceiling(&self) -> usize {
        let ceiling = if self.aggressive {
            self.aggressive_concurrency
        } else {
            self.max_concurrency
        };
        ceiling.max(1)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Directory outside of which no read/write is permitted. `~` is expanded.
    #[serde(default = "default_sandbox_root")]
    pub root: String,

    #[serde(default = "default_read_cache_ttl_ms")]
    pub read_cache_ttl_ms: u64,

    #[serde(default = "default_read_cache_capacity")]
    pub read_cache_capacity: usize,

    /// Permit `|`, `;`, `&&` and redirections in shell commands.
    #[serde(default)]
    pub allow_shell_metacharacters: bool,

    #[serde(default = "default_shell_timeout_secs")]
    pub shell_timeout_secs: u64,
}

fn default_sandbox_root() -> String {
    ".".to_string()
}

fn default_read_cache_ttl_ms() -> u64 {
    30_000
}

fn default_read_cache_capacity() -> usize {
    256
}

fn default_shell_timeout_secs() -> u64 {
    120
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            root: default_sandbox_root(),
            read_cache_ttl_ms: default_read_cache_ttl_ms(),
            read_cache_capacity: default_read_cache_capacity(),
            allow_shell_metacharacters: false,
            shell_timeout_secs: default_shell_timeout_secs(),
        }
    }
}

impl SandboxConfig {
    pub fn read_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.read_cache_ttl_ms)
    }

    pub fn shell_timeout(&self) -> Duration {
        Duration::from_secs(self.shell_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// When false, tool-reference phrasings in descriptions are ignored.
    /// Explicit tool bindings are always honored.
    #[serde(default = "default_tool_routing_enabled")]
    pub tool_routing_enabled: bool,
}

fn default_tool_routing_enabled() -> bool {
    true
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            tool_routing_enabled: default_tool_routing_enabled(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default = "default_reasoning_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_reasoning_model")]
    pub model: String,

    /// Opaque backend override passed through to the reasoning call.
    #[serde(default)]
    pub forced_backend: Option<String>,

    #[serde(default = "default_reasoning_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_reasoning_endpoint() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_reasoning_model() -> String {
    "qwen2.5-coder:7b".to_string()
}

fn default_reasoning_timeout_secs() -> u64 {
    120
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            endpoint: default_reasoning_endpoint(),
            model: default_reasoning_model(),
            forced_backend: None,
            timeout_secs: default_reasoning_timeout_secs(),
        }
    }
}

impl ReasoningConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Declared programming language, e.g. "typescript".
    #[serde(default)]
    pub language: Option<String>,

    /// Declared natural language of responses, e.g. "en".
    #[serde(default)]
    pub natural_language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingConfig {
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u32,

    /// Per-result summary budget in the evaluation prompt.
    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,
}

fn default_max_cycles() -> u32 {
    3
}

fn default_summary_chars() -> usize {
    200
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            max_cycles: default_max_cycles(),
            summary_chars: default_summary_chars(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.scheduler.concurrency_ceiling(), 4);
        assert_eq!(cfg.scheduler.max_retries, 2);
        assert_eq!(cfg.scheduler.task_timeout(), Duration::from_secs(300));
        assert_eq!(cfg.healing.max_cycles, 3);
    }

    #[test]
    fn aggressive_preset_raises_ceiling() {
        assert_eq!(SchedulerConfig::aggressive().concurrency_ceiling(), 12);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.scheduler.max_concurrency = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid {
                field: "scheduler.max_concurrency",
                ..
            })
        ));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [scheduler]
            max_concurrency = 2
            deadlock_policy = "fail_fast"

            [project]
            language = "typescript"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.scheduler.max_concurrency, 2);
        assert_eq!(cfg.scheduler.deadlock_policy, DeadlockPolicy::FailFast);
        assert_eq!(cfg.scheduler.task_timeout_secs, 300);
        assert_eq!(cfg.project.language.as_deref(), Some("typescript"));
        assert!(cfg.routing.tool_routing_enabled);
    }

    #[test]
    fn deadlock_policy_parses_cli_spellings() {
        assert_eq!(
            "force-clear-cycle".parse::<DeadlockPolicy>().unwrap(),
            DeadlockPolicy::ForceClearCycle
        );
        assert!("sometimes".parse::<DeadlockPolicy>().is_err());
    }
}
