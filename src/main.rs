use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod models;
mod reconcile;
mod services;

use config::{AppConfig, SourceConfig, Task};
use services::{
    files,
    memory_target::InMemoryTarget,
    migrator::{self, Migrator, RunContext, RunSummary},
    source::{AnySource, SnapshotSource},
    v1_client::V1Client,
    v2_client::V2Client,
};

#[tokio::main]
async fn main() -> Result<()> {
    let (cfg, task) = AppConfig::from_env_and_args()?;

    // --- Logging setup ---
    init_tracing(cfg.trace);
    tracing::debug!("Starting migration with config: {:?}", cfg);

    let summary = run(&cfg, task).await?;
    summary.log();
    if !summary.is_success() {
        anyhow::bail!("{} operation(s) failed", summary.failed.len());
    }
    Ok(())
}

fn init_tracing(trace: bool) {
    let level = if trace { "trace" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,influx_meta_migrate={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Live v1 server, or the snapshot file when one is configured.
async fn open_source(cfg: &SourceConfig) -> Result<AnySource> {
    match &cfg.meta_dump_file {
        Some(path) => {
            let snapshot = SnapshotSource::load(path)
                .await
                .with_context(|| format!("reading v1 metadata from {}", path.display()))?;
            Ok(AnySource::Snapshot(snapshot))
        }
        None => {
            tracing::info!("Using v1 server at {}", cfg.url);
            Ok(AnySource::Live(V1Client::new(cfg)?))
        }
    }
}

/// Resolve the target organization once per run.
async fn connect_target(cfg: &AppConfig) -> Result<(V2Client, RunContext)> {
    let target_cfg = cfg.target.require()?;
    let client = V2Client::new(&target_cfg)?;
    tracing::info!("Using v2 server at {}", target_cfg.url);
    let ctx = RunContext::resolve(&client, &target_cfg.org)
        .await
        .with_context(|| format!("resolving organization {}", target_cfg.org))?;
    tracing::info!("Organization {} has id {}", ctx.org_name, ctx.org_id);
    Ok((client, ctx))
}

async fn run(cfg: &AppConfig, task: Task) -> Result<RunSummary> {
    match task {
        // --- Dump needs no target ---
        Task::Dump { output } => {
            let source = open_source(&cfg.source).await?;
            let snapshot = migrator::dump_source(&source).await?;
            files::write_snapshot(&output, &snapshot)
                .await
                .with_context(|| format!("writing snapshot to {}", output.display()))?;
            tracing::info!(
                "Dumped {} retention policies and {} users to {}",
                snapshot.dbrps.len(),
                snapshot.users.len(),
                output.display()
            );
            Ok(RunSummary::default())
        }
        Task::Migrate {
            dry_run: true,
            mut options,
        } => {
            if options.users_file.take().is_some() {
                tracing::warn!("--users-file is ignored in a dry run");
            }
            let (client, ctx) = connect_target(cfg).await?;
            let source = open_source(&cfg.source).await?;
            let mirror = InMemoryTarget::mirror(&client, &ctx)
                .await
                .context("copying target state")?;
            let migrator = Migrator::new(source, mirror, ctx);
            let summary = migrator.migrate(&options).await?;
            for call in migrator.target().calls() {
                tracing::info!("dry run: would {call}");
            }
            Ok(summary)
        }
        Task::Migrate {
            dry_run: false,
            options,
        } => {
            let (client, ctx) = connect_target(cfg).await?;
            let source = open_source(&cfg.source).await?;
            Migrator::new(source, client, ctx).migrate(&options).await
        }
        Task::DeleteBuckets { names } => {
            let (client, ctx) = connect_target(cfg).await?;
            let source = open_source(&cfg.source).await?;
            Migrator::new(source, client, ctx).delete_buckets(&names).await
        }
        Task::DeleteAuthorizations => {
            let (client, ctx) = connect_target(cfg).await?;
            let source = open_source(&cfg.source).await?;
            Migrator::new(source, client, ctx).delete_authorizations().await
        }
        Task::SetPassword {
            users_file,
            default_password,
        } => {
            let (client, ctx) = connect_target(cfg).await?;
            let entries = files::read_users_file(&users_file)
                .await
                .with_context(|| format!("reading users file {}", users_file.display()))?;
            migrator::set_passwords(&client, &ctx, &entries, default_password.as_deref()).await
        }
    }
}
