mod load;
mod types;

pub use load::{finish, get_hive_data_dir, load_default, load_from_path, resolve_sandbox_root};
pub use types::{
    AppConfig, DeadlockPolicy, HealingConfig, LoggingConfig, ProjectConfig, ReasoningConfig,
    RoutingConfig, SandboxConfig, SchedulerConfig,
};
