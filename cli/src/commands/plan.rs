use hive_core::api::AppConfig;
use hive_plugins::factory;

use super::cli::PlanArgs;
use super::tasks::TaskFile;

pub async fn plan(args: PlanArgs, cfg: AppConfig) -> anyhow::Result<i32> {
    let file = TaskFile::load(&args.tasks)?;
    let collaborators = factory::build_collaborators(&cfg)?;
    let dispatcher = factory::build_dispatcher(&cfg, collaborators)?;
    let scheduler = factory::build_scheduler(&cfg, dispatcher)?;

    let waves = scheduler.plan(&file.tasks)?;
    for (idx, wave) in waves.iter().enumerate() {
        let ids: Vec<String> = wave.iter().map(ToString::to_string).collect();
        println!("wave {idx}: {}", ids.join(", "));
    }
    println!(
        "{} tasks in {} waves (deadlock policy: {})",
        file.tasks.len(),
        waves.len(),
        scheduler.config().deadlock_policy.as_str()
    );
    Ok(0)
}
