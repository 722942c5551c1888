use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use harvester_core::config::{load_job, HarvesterConfig, LookupConfig};
use harvester_http::{HttpCaller, HttpLookup};
use harvester_params::{LookupRegistry, ParameterSpaceExpander, StaticLookup, ValueSourceResolver};
use harvester_scheduler::{
    CronValidator, ExecutionLog, ExecutionLogStore, JobPipeline, JobStatistics,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Named lookups from `[lookups]`; HTTP ones share `client`.
pub(crate) fn build_lookups(config: &HarvesterConfig, client: &reqwest::Client) -> LookupRegistry {
    let mut registry = LookupRegistry::new();
    for (name, lookup) in &config.lookups {
        match lookup {
            LookupConfig::Static { values } => {
                registry.register(name, Arc::new(StaticLookup::new(name, values.clone())));
            }
            LookupConfig::Http {
                url,
                method,
                json_path,
            } => {
                registry.register(
                    name,
                    Arc::new(
                        HttpLookup::new(name, url, client.clone())
                            .with_method(*method)
                            .with_json_path(json_path.clone()),
                    ),
                );
            }
        }
    }
    info!(lookups = config.lookups.len(), "lookup registry built");
    registry
}

fn pipeline(config: &HarvesterConfig) -> anyhow::Result<JobPipeline> {
    let client = harvester_http::caller::build_client(&config.http)?;
    let resolver =
        ValueSourceResolver::new().with_lookup(Arc::new(build_lookups(config, &client)));
    Ok(JobPipeline::new(
        ParameterSpaceExpander::new(resolver),
        Arc::new(HttpCaller::with_client(client)),
    ))
}

fn open_store(config: &HarvesterConfig) -> anyhow::Result<ExecutionLogStore> {
    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");
    let conn = rusqlite::Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(ExecutionLogStore::new(conn)?)
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}

/// Prints the verdict; `true` when the expression is valid.
pub(crate) fn validate_cron(expression: &str) -> bool {
    let validator = CronValidator::new();
    match validator.check(expression) {
        Ok(()) => {
            if validator.is_common_pattern(expression) {
                println!("valid (common pattern)");
            } else {
                println!("valid");
            }
            true
        }
        Err(e) => {
            println!("invalid: {e}");
            false
        }
    }
}

pub(crate) async fn expand(config: &HarvesterConfig, job_file: &Path) -> anyhow::Result<ExitCode> {
    let job = load_job(job_file)?;
    let plan = pipeline(config)?.plan(&job).await?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(ExitCode::SUCCESS)
}

pub(crate) async fn run(
    config: &HarvesterConfig,
    job_file: &Path,
    no_log: bool,
) -> anyhow::Result<ExitCode> {
    let job = load_job(job_file)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current call");
            on_signal.cancel();
        }
    });

    let pipeline = pipeline(config)?.with_cancellation(cancel);
    pipeline
        .accept(&job)
        .with_context(|| format!("job {} rejected", job.job_code))?;
    let report = pipeline.execute(&job).await?;
    let log = ExecutionLog::from_report(&job, &report);

    if no_log {
        info!(run_id = %report.run_id, "execution log skipped (--no-log)");
    } else {
        open_store(config)?.record(&log)?;
    }

    println!("{}", serde_json::to_string_pretty(&log)?);
    Ok(if report.run.cancelled {
        ExitCode::from(130)
    } else {
        ExitCode::SUCCESS
    })
}

pub(crate) fn logs(
    config: &HarvesterConfig,
    job: Option<&str>,
    limit: usize,
) -> anyhow::Result<ExitCode> {
    let store = open_store(config)?;
    let entries = store.list_recent(job, limit)?;
    if entries.is_empty() {
        println!("no execution logs");
    }
    for log in entries {
        println!(
            "{}  {:<20} {:<9} processed={} ok={} failed={}{}",
            log.start_time,
            log.job_code,
            log.status,
            log.processed_count,
            log.success_count,
            log.fail_count,
            log.error_message
                .map(|m| format!("  [{m}]"))
                .unwrap_or_default(),
        );
    }
    Ok(ExitCode::SUCCESS)
}

pub(crate) fn stats(config: &HarvesterConfig, since: Option<&str>) -> anyhow::Result<ExitCode> {
    let stats = open_store(config)?.statistics(since)?;
    if stats.is_empty() {
        println!("no execution logs");
    }
    for s in &stats {
        println!("{}", format_stats(s));
    }
    Ok(ExitCode::SUCCESS)
}

fn format_stats(s: &JobStatistics) -> String {
    format!(
        "{:<20} runs={} completed={} stopped={} failed={} calls={} ok={} failed_calls={}  last={}",
        s.job_code,
        s.run_count,
        s.completed_count,
        s.stopped_count,
        s.failed_count,
        s.processed_total,
        s.success_total,
        s.fail_total,
        s.last_end_time.as_deref().unwrap_or("-"),
    )
}
