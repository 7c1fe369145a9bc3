use std::sync::Mutex;
use std::time::{Duration, Instant};

use hive_core::api::{ConcurrencyContext, ConcurrencyStrategyPlugin, SchedulerConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct ConcurrencyConfig {
    pub min_concurrency: usize,
    pub max_concurrency: usize,
    pub cpu_threshold_low: f32,
    pub cpu_threshold_high: f32,
}

impl ConcurrencyConfig {
    pub fn from_scheduler(cfg: &SchedulerConfig) -> Self {
        Self {
            min_concurrency: 1,
            max_concurrency: cfg.concurrency_ceiling(),
            cpu_threshold_low: 30.0,
            cpu_threshold_high: 80.0,
        }
    }
}

/// CPU snapshot, refreshed at most once per second.
struct CpuSampler {
    sys: sysinfo::System,
    cpu_count: usize,
    last_refresh: Instant,
    cached_usage: f32,
}

impl CpuSampler {
    fn new() -> Self {
        let mut sys = sysinfo::System::new();
        sys.refresh_cpu();
        let cpu_count = sys.cpus().len().max(1);
        let cached_usage = average_usage(&sys, cpu_count);
        Self {
            sys,
            cpu_count,
            last_refresh: Instant::now(),
            cached_usage,
        }
    }

    fn sample(&mut self) -> (usize, f32) {
        if self.last_refresh.elapsed() > Duration::from_secs(1) {
            self.sys.refresh_cpu();
            self.cached_usage = average_usage(&self.sys, self.cpu_count);
            self.last_refresh = Instant::now();
        }
        (self.cpu_count, self.cached_usage)
    }
}

fn average_usage(sys: &sysinfo::System, cpu_count: usize) -> f32 {
    sys.cpus().iter().map(|c| c.cpu_usage()).sum::<f32>() / cpu_count as f32
}

pub struct AdaptiveConcurrencyPlugin {
    config: ConcurrencyConfig,
    sampler: Mutex<CpuSampler>,
}

pub struct FixedConcurrencyPlugin {
    fixed: usize,
}

impl AdaptiveConcurrencyPlugin {
    pub fn new(config: ConcurrencyConfig) -> Self {
        Self {
            config,
            sampler: Mutex::new(CpuSampler::new()),
        }
    }

    /// Halve under load, double when idle up to the configured ceiling, and
    /// never exceed the CPU count.
    pub fn adjust(&self, base: usize, cpu_usage: f32, available_cpus: usize) -> usize {
        let mut desired = base;

        if cpu_usage >= self.config.cpu_threshold_high {
            desired = desired.saturating_div(2).max(self.config.min_concurrency);
        } else if cpu_usage <= self.config.cpu_threshold_low {
            desired = desired.saturating_mul(2).min(self.config.max_concurrency);
        }

        desired = desired.clamp(self.config.min_concurrency, self.config.max_concurrency);
        desired.clamp(1, available_cpus.max(1))
    }
}

impl FixedConcurrencyPlugin {
    pub fn new(fixed: usize) -> Self {
        Self { fixed }
    }
}

impl ConcurrencyStrategyPlugin for AdaptiveConcurrencyPlugin {
    fn name(&self) -> &str {
        "adaptive"
    }

    fn calculate_concurrency(&self, context: &ConcurrencyContext) -> usize {
        let (cpus, usage) = match self.sampler.lock() {
            Ok(mut sampler) => sampler.sample(),
            Err(poisoned) => poisoned.into_inner().sample(),
        };
        let desired = self.adjust(context.base_concurrency, usage, cpus);
        tracing::debug!(
            target: "hive.sched",
            cpu_usage = usage,
            cpus = cpus,
            base = context.base_concurrency,
            desired = desired,
            "adaptive concurrency"
        );
        desired
    }
}

impl ConcurrencyStrategyPlugin for FixedConcurrencyPlugin {
    fn name(&self) -> &str {
        "fixed"
    }

    fn calculate_concurrency(&self, _context: &ConcurrencyContext) -> usize {
        self.fixed.max(1)
    }
}
