use anyhow::{Context, Result, bail};
use srn_application::{MigrationRequest, ScopeService};
use srn_core::migration::{ExecutionOptions, JobStatus, MigrationJob};
use srn_core::scope::Scope;
use srn_infrastructure::SrnConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{build_engine, print_json};

pub async fn discover(config: &SrnConfig, workspace: Option<&str>) -> Result<()> {
    let engine = build_engine(config)?;
    let workspaces = match workspace {
        Some(workspace) => vec![workspace.to_string()],
        None => engine.discover_workspaces().await?,
    };
    if workspaces.is_empty() {
        println!("No legacy workspaces found");
        return Ok(());
    }

    for workspace in workspaces {
        let inventory = engine.discover(&workspace).await?;
        println!("{} ({} items)", workspace, inventory.total_items());
        for (kind, count) in &inventory.counts {
            println!("  {:<14} {}", kind, count);
        }
    }
    Ok(())
}

pub async fn plan(config: &SrnConfig, workspace: &str, target: &str, submit: bool) -> Result<()> {
    let service = ScopeService::new(Arc::new(build_engine(config)?));
    let request = MigrationRequest {
        source_workspace: workspace.to_string(),
        target_scope: target.to_string(),
        dry_run: !submit,
        batch_size: Some(config.migration.batch_size),
    };
    match service.validate_migration(request).await {
        Ok(validation) => print_json(&validation),
        Err(error) => {
            print_json(&error)?;
            bail!("{}", error)
        }
    }
}

pub async fn migrate(
    config: &SrnConfig,
    workspace: &str,
    target: &str,
    dry_run: bool,
    batch_size: Option<usize>,
) -> Result<()> {
    let engine = build_engine(config)?;
    let target = Scope::from_string(target).context("Invalid target scope")?;
    let plan = engine.plan_for(workspace, &target).await?;
    for warning in &plan.warnings {
        tracing::warn!("{}", warning);
    }

    let mut options = options(config, batch_size);
    options.dry_run = dry_run;
    let job = engine.execute(plan, options, cancel_on_ctrl_c()).await?;
    summarize(&job)
}

pub async fn resume(config: &SrnConfig, job_id: &str, batch_size: Option<usize>) -> Result<()> {
    let engine = build_engine(config)?;
    let job = engine
        .resume(job_id, options(config, batch_size), cancel_on_ctrl_c())
        .await?;
    summarize(&job)
}

pub async fn status(config: &SrnConfig, job_id: &str) -> Result<()> {
    let engine = build_engine(config)?;
    let report = engine.status(job_id).await?;
    print_json(&report)
}

pub async fn jobs(config: &SrnConfig) -> Result<()> {
    let engine = build_engine(config)?;
    let jobs = engine.list_jobs().await?;
    if jobs.is_empty() {
        println!("No migration jobs");
    }
    for job in jobs {
        println!(
            "{}  {:<12} {:>6}/{:<6} {} -> {}",
            job.id,
            job.status.to_string(),
            job.processed_count,
            job.total_items(),
            job.plan.source_workspace,
            job.plan.target
        );
    }
    Ok(())
}

pub async fn rollback(config: &SrnConfig, job_id: &str) -> Result<()> {
    let engine = build_engine(config)?;
    let job = engine.rollback(job_id).await?;
    summarize(&job)
}

fn options(config: &SrnConfig, batch_size: Option<usize>) -> ExecutionOptions {
    let options = config.execution_options();
    match batch_size {
        Some(batch_size) => options.with_batch_size(batch_size),
        None => options,
    }
}

/// Token cancelled by the first Ctrl-C. The engine stops between batches.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; stopping after the current batch");
            child.cancel();
        }
    });
    token
}

fn summarize(job: &MigrationJob) -> Result<()> {
    print_json(&job.status_report())?;
    if job.dry_run {
        println!("Dry run: nothing was written");
    }
    match job.status {
        JobStatus::Completed | JobStatus::RolledBack => Ok(()),
        _ if job.dry_run => Ok(()),
        status => bail!(
            "job {} ended {}; run `srn resume {}` to retry",
            job.id,
            status,
            job.id
        ),
    }
}
