use hive_core::api::{AppConfig, ExecutionResult, HealingOutcome, RunReport};
use hive_plugins::factory;

use super::cli::RunArgs;
use super::tasks::TaskFile;

pub async fn run(args: RunArgs, cfg: AppConfig) -> anyhow::Result<i32> {
    let file = TaskFile::load(&args.tasks)?;
    let collaborators = factory::build_collaborators(&cfg)?;
    let dispatcher = factory::build_dispatcher(&cfg, collaborators.clone())?;
    let scheduler = factory::build_scheduler(&cfg, dispatcher)?;

    let report = scheduler.process(&file.tasks).await;

    let objective = args.objective.clone().or(file.objective);
    let healing = match (args.heal, objective) {
        (true, Some(objective)) => {
            let healer = factory::build_healing(&cfg, &collaborators);
            Some(healer.run(&objective, &report.results, &scheduler).await)
        }
        (true, None) => {
            tracing::warn!(target: "hive.cli", "--heal needs an objective; skipping repair loop");
            None
        }
        _ => None,
    };

    if args.json {
        let doc = serde_json::json!({ "report": &report, "healing": &healing });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        print_report(&report);
        if let Some(outcome) = &healing {
            print_healing(outcome);
        }
    }

    let success = match &healing {
        Some(outcome) => outcome.success,
        None => report.aggregate_error.is_none(),
    };
    Ok(if success { 0 } else { 1 })
}

fn print_report(report: &RunReport) {
    for result in &report.results {
        println!("{}", result_line(result));
    }
    match &report.aggregate_error {
        Some(agg) => println!("{agg}"),
        None => println!(
            "{} tasks succeeded in {}ms",
            report.results.len(),
            report.duration_ms
        ),
    }
}

fn print_healing(outcome: &HealingOutcome) {
    println!(
        "self-healing: {} after {} repair cycle(s)",
        if outcome.success { "achieved" } else { "not achieved" },
        outcome.repair_cycles
    );
    for lesson in &outcome.lessons {
        println!(
            "  cycle {} [{}]: {} -> {}",
            lesson.cycle(),
            lesson.timestamp().to_rfc3339(),
            lesson.problem(),
            lesson.solution()
        );
    }
}

fn result_line(result: &ExecutionResult) -> String {
    match &result.error {
        None => format!(
            "[ok]     task {} ({} attempt(s), {}ms)",
            result.task_id, result.attempts, result.duration_ms
        ),
        Some(err) => format!(
            "[failed] task {} ({} attempt(s), {}ms) {}: {err}",
            result.task_id,
            result.attempts,
            result.duration_ms,
            err.kind()
        ),
    }
}
