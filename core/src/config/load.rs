use std::path::{Path, PathBuf};

use super::types::AppConfig;
use crate::dispatch::path_guard::normalize_lexically;
use crate::error::ConfigError;

/// Get the default hive data directory: ~/.hive
pub fn get_hive_data_dir() -> Result<PathBuf, ConfigError> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| ConfigError::HomeDir)?;
    Ok(PathBuf::from(home).join(".hive"))
}

pub fn load_default() -> Result<AppConfig, ConfigError> {
    // Priority 1: ~/.hive/config.toml (highest)
    let hive_config = get_hive_data_dir()?.join("config.toml");

    // Priority 2: ./hive.toml (current directory)
    let local_config = Path::new("hive.toml");

    let cfg = if hive_config.exists() {
        load_from_path(&hive_config)?
    } else if local_config.exists() {
        load_from_path(local_config)?
    } else {
        AppConfig::default()
    };

    finish(cfg)
}

pub fn load_from_path(path: &Path) -> Result<AppConfig, ConfigError> {
    let s = std::fs::read_to_string(path)?;
    Ok(toml::from_str::<AppConfig>(&s)?)
}

/// Apply environment overrides and validate.
pub fn finish(mut cfg: AppConfig) -> Result<AppConfig, ConfigError> {
    apply_env_overrides(&mut cfg)?;
    cfg.validate()?;
    Ok(cfg)
}

fn apply_env_overrides(cfg: &mut AppConfig) -> Result<(), ConfigError> {
    // Environment variable overrides (Priority 0: highest)
    if let Some(v) = non_empty_env("HIVE_SANDBOX_ROOT") {
        cfg.sandbox.root = v;
    }
    if let Some(v) = non_empty_env("HIVE_FORCED_BACKEND") {
        cfg.reasoning.forced_backend = Some(v);
    }
    if let Some(v) = non_empty_env("HIVE_REASONING_URL") {
        cfg.reasoning.endpoint = v;
    }
    if let Some(v) = non_empty_env("HIVE_MAX_CONCURRENCY") {
        cfg.scheduler.max_concurrency = v.parse().map_err(|_| {
            ConfigError::invalid("HIVE_MAX_CONCURRENCY", format!("not a number: {v}"))
        })?;
    }
    Ok(())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the configured sandbox root to an absolute, normalized path.
pub fn resolve_sandbox_root(root: &str) -> Result<PathBuf, ConfigError> {
    let expanded = shellexpand::tilde(root.trim()).to_string();
    let path = PathBuf::from(expanded);
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()?.join(path)
    };
    normalize_lexically(&absolute)
        .ok_or_else(|| ConfigError::invalid("sandbox.root", "escapes the filesystem root"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_root_becomes_absolute() {
        let root = resolve_sandbox_root("./work/../project").unwrap();
        assert!(root.is_absolute());
        assert!(root.ends_with("project"));
        assert!(!root.to_string_lossy().contains(".."));
    }

    #[test]
    fn absolute_root_is_kept() {
        let root = resolve_sandbox_root("/srv/project/").unwrap();
        assert_eq!(root, PathBuf::from("/srv/project"));
    }
}
