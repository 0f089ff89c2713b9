//! Worker protocol commands: reserve, complete, error, race.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use jobslot_core::{Backend, Reservation, StoreRegistry};
use serde::Serialize;
use tokio::sync::Barrier;

use super::{Context, JobArgs, parse_key};
use crate::OutputFormat;

#[derive(Debug, Args)]
pub struct ErrorArgs {
    pub work_unit: String,

    /// Identifying key as a JSON object.
    pub key: String,

    /// Error message (cut to 1023 characters).
    pub message: String,

    /// Stack trace or other failure payload.
    #[arg(long)]
    pub stack: Option<String>,
}

#[derive(Debug, Args)]
pub struct RaceArgs {
    pub work_unit: String,

    /// Identifying key as a JSON object.
    pub key: String,

    /// Number of concurrent reservers.
    #[arg(long, short = 'w', default_value_t = 8)]
    pub workers: usize,

    /// Complete the winning reservation afterwards.
    #[arg(long)]
    pub release: bool,
}

/// Outcome of one race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RaceReport {
    pub workers: usize,
    pub acquired: usize,
    pub taken: usize,
}

pub async fn reserve(ctx: &Context, args: &JobArgs) -> Result<()> {
    let key = args.key()?;
    let store = ctx.store().await?;
    let outcome = store.reserve(&args.work_unit, &key).await?;
    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&outcome)?),
        OutputFormat::Text => match outcome {
            Reservation::Acquired => println!("acquired"),
            Reservation::AlreadyTaken => println!("taken"),
        },
    }
    Ok(())
}

pub async fn complete(ctx: &Context, args: &JobArgs) -> Result<()> {
    let key = args.key()?;
    ctx.store().await?.complete(&args.work_unit, &key).await?;
    Ok(())
}

pub async fn error(ctx: &Context, args: &ErrorArgs) -> Result<()> {
    let key = parse_key(&args.key)?;
    ctx.store()
        .await?
        .error(&args.work_unit, &key, &args.message, args.stack.as_deref())
        .await?;
    Ok(())
}

pub async fn race(ctx: &Context, args: &RaceArgs) -> Result<()> {
    let report = run_race(ctx, args).await?;
    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => println!(
            "{} workers: {} acquired, {} taken",
            report.workers, report.acquired, report.taken
        ),
    }
    Ok(())
}

/// Every reserver gets its own registry, as separate worker processes would.
///
/// All reservers are awaited before anything is reported, so a winner is
/// still released with `--release` when another reserver failed.
pub async fn run_race(ctx: &Context, args: &RaceArgs) -> Result<RaceReport> {
    anyhow::ensure!(args.workers > 0, "--workers must be at least 1");
    let key = parse_key(&args.key)?;
    let backend = Backend::from_config(&ctx.config);

    let mut stores = Vec::with_capacity(args.workers);
    for _ in 0..args.workers {
        let registry = StoreRegistry::new(Arc::new(backend.clone()));
        stores.push(registry.get(&ctx.namespace).await?);
    }

    let barrier = Arc::new(Barrier::new(args.workers));
    let mut handles = Vec::with_capacity(args.workers);
    for store in stores {
        let barrier = Arc::clone(&barrier);
        let work_unit = args.work_unit.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let outcome = store.reserve(&work_unit, &key).await?;
            anyhow::Ok((store, outcome))
        }));
    }

    let mut acquired = 0;
    let mut taken = 0;
    let mut winner = None;
    let mut failure = None;
    for h in handles {
        let result = match h.await {
            Ok(result) => result,
            Err(e) => Err(e.into()),
        };
        match result {
            Ok((store, Reservation::Acquired)) => {
                acquired += 1;
                winner = Some(store);
            }
            Ok((_, Reservation::AlreadyTaken)) => taken += 1,
            Err(e) => {
                tracing::warn!(error = %e, "reserver failed");
                if failure.is_none() {
                    failure = Some(e);
                }
            }
        }
    }

    if args.release
        && let Some(store) = winner
    {
        store.complete(&args.work_unit, &key).await?;
    }
    if let Some(e) = failure {
        return Err(e.context("race aborted"));
    }

    let report = RaceReport {
        workers: args.workers,
        acquired,
        taken,
    };
    tracing::debug!(?report, "race finished");
    Ok(report)
}
