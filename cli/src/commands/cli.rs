use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use hive_core::api::{AppConfig, ConfigError, DeadlockPolicy};

#[derive(Parser, Debug)]
#[command(name = "hive", version, about = "Run task graphs with routed execution and self-healing")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file; defaults to ~/.hive/config.toml, then ./hive.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a task file.
    Run(RunArgs),
    /// Print the wave layout of a task file without executing it.
    Plan(PlanArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// JSON task list, or an object with `tasks` and an optional `objective`.
    #[arg(long)]
    pub tasks: PathBuf,

    /// Objective for the self-healing loop. Overrides the task file's.
    #[arg(long)]
    pub objective: Option<String>,

    /// Run the self-healing loop after the graph completes.
    #[arg(long, default_value_t = false)]
    pub heal: bool,

    /// Print the full report as JSON instead of a summary.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PlanArgs {
    #[arg(long)]
    pub tasks: PathBuf,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

/// Flags that take precedence over the config file.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct OverrideArgs {
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Use the aggressive concurrency preset.
    #[arg(long, default_value_t = false)]
    pub aggressive: bool,

    /// Per-attempt task timeout.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Sandbox root for every file and shell operation.
    #[arg(long)]
    pub root: Option<String>,

    #[arg(long, default_value_t = false)]
    pub no_tool_routing: bool,

    /// Forced reasoning backend, passed through to the reasoning call.
    #[arg(long)]
    pub backend: Option<String>,

    /// fail_fast | force_clear_all | force_clear_cycle
    #[arg(long)]
    pub deadlock_policy: Option<String>,
}

impl OverrideArgs {
    pub fn apply(&self, cfg: &mut AppConfig) -> Result<(), ConfigError> {
        if self.aggressive {
            cfg.scheduler.aggressive = true;
        }
        if let Some(n) = self.concurrency {
            if cfg.scheduler.aggressive {
                cfg.scheduler.aggressive_concurrency = n;
            } else {
                cfg.scheduler.max_concurrency = n;
            }
        }
        if let Some(secs) = self.timeout_secs {
            cfg.scheduler.task_timeout_secs = secs;
        }
        if let Some(retries) = self.max_retries {
            cfg.scheduler.max_retries = retries;
        }
        if let Some(root) = &self.root {
            cfg.sandbox.root = root.clone();
        }
        if self.no_tool_routing {
            cfg.routing.tool_routing_enabled = false;
        }
        if let Some(backend) = &self.backend {
            cfg.reasoning.forced_backend = Some(backend.clone());
        }
        if let Some(policy) = &self.deadlock_policy {
            cfg.scheduler.deadlock_policy = policy.parse::<DeadlockPolicy>()?;
        }
        cfg.validate()
    }
}
