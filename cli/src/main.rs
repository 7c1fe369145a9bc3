use clap::Parser;
mod commands;
use commands::cli;
use hive_core::api::{AppConfig, ConfigError, ExecutorError, LoggingConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e:#}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> anyhow::Result<i32> {
    let args = cli::Args::parse();
    let cfg = load_config(args.config.as_deref())?;
    init_tracing(&cfg.logging).map_err(anyhow::Error::msg)?;

    match args.command {
        cli::Commands::Run(run_args) => {
            let mut cfg = cfg;
            run_args.overrides.apply(&mut cfg)?;
            commands::run::run(run_args, cfg).await
        }
        cli::Commands::Plan(plan_args) => {
            let mut cfg = cfg;
            plan_args.overrides.apply(&mut cfg)?;
            commands::plan::plan(plan_args, cfg).await
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(p) => hive_core::config::finish(hive_core::config::load_from_path(p)?),
        None => hive_core::config::load_default(),
    }
}

fn exit_code_for_error(e: &anyhow::Error) -> i32 {
    // 0: success
    // 1: one or more tasks failed
    // 11: config error
    // 20: IO / task file error
    // 50: internal/uncategorized
    if e.downcast_ref::<ConfigError>().is_some() {
        return 11;
    }
    if let Some(exec) = e.downcast_ref::<ExecutorError>() {
        return match exec {
            ExecutorError::Config(_) => 11,
            _ => 1,
        };
    }
    if e.downcast_ref::<std::io::Error>().is_some()
        || e.downcast_ref::<serde_json::Error>().is_some()
    {
        return 20;
    }
    50
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => std::path::PathBuf::from(d),
            None => std::env::temp_dir().join("hive"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("hive.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| e.to_string())
}
