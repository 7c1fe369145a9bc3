use std::sync::Arc;

use anyhow::Result;

use hive_core::api::{
    AppConfig, Collaborators, ConcurrencyStrategyPlugin, DispatchConfig, Dispatcher,
    RetryStrategyPlugin, Scheduler, SelfHealingLoop, TaskExecutor,
};

use crate::backend::{BuiltinTools, HostShell, HttpReasoning, LocalFs};
use crate::executor::strategies::{
    AdaptiveConcurrencyPlugin, ConcurrencyConfig, ExponentialBackoffPlugin,
    FixedConcurrencyPlugin, LinearRetryPlugin, RetryConfig,
};

pub fn build_collaborators(cfg: &AppConfig) -> Result<Collaborators> {
    Ok(Collaborators {
        reasoning: Arc::new(HttpReasoning::new(
            &cfg.reasoning.endpoint,
            cfg.reasoning.model.clone(),
        )?),
        tools: Arc::new(BuiltinTools::new(cfg.reasoning.timeout())?),
        fs: Arc::new(LocalFs::new()),
        shell: Arc::new(HostShell::default()),
    })
}

pub fn build_retry_strategy(cfg: &AppConfig) -> Arc<dyn RetryStrategyPlugin> {
    let retry = RetryConfig::from_scheduler(&cfg.scheduler);
    match cfg.scheduler.retry_strategy.as_str() {
        "linear" => Arc::new(LinearRetryPlugin::new(retry)),
        // Anything else gets exponential backoff.
        _ => Arc::new(ExponentialBackoffPlugin::new(retry)),
    }
}

pub fn build_concurrency_strategy(cfg: &AppConfig) -> Arc<dyn ConcurrencyStrategyPlugin> {
    match cfg.scheduler.concurrency_strategy.as_str() {
        "adaptive" => Arc::new(AdaptiveConcurrencyPlugin::new(
            ConcurrencyConfig::from_scheduler(&cfg.scheduler),
        )),
        _ => Arc::new(FixedConcurrencyPlugin::new(
            cfg.scheduler.concurrency_ceiling(),
        )),
    }
}

pub fn build_dispatcher(cfg: &AppConfig, collaborators: Collaborators) -> Result<Arc<Dispatcher>> {
    let dispatch = DispatchConfig::from_app_config(cfg)?;
    Ok(Arc::new(Dispatcher::new(collaborators, dispatch)))
}

pub fn build_scheduler(cfg: &AppConfig, executor: Arc<dyn TaskExecutor>) -> Result<Scheduler> {
    let scheduler = Scheduler::builder(cfg, executor)
        .retry_strategy(build_retry_strategy(cfg))
        .concurrency_strategy(build_concurrency_strategy(cfg))
        .build()?;
    Ok(scheduler)
}

pub fn build_healing(cfg: &AppConfig, collaborators: &Collaborators) -> SelfHealingLoop {
    SelfHealingLoop::new(
        collaborators.reasoning.clone(),
        cfg.healing.clone(),
        cfg.reasoning.timeout(),
    )
    .with_backend(cfg.reasoning.forced_backend.clone())
}
