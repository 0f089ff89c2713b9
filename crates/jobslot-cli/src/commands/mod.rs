//! Command implementations.

pub mod admin;
pub mod inspect;
pub mod worker;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use jobslot_core::{
    Backend, JobKey, JobStatus, JobslotConfig, RecordFilter, ReservationStore, StoreRegistry,
};

use crate::{Cli, Commands, OutputFormat};

/// A unit of work: work unit name plus its key as a JSON object.
#[derive(Debug, Args)]
pub struct JobArgs {
    /// Work unit (table / task family) name.
    pub work_unit: String,

    /// Identifying key as a JSON object, e.g. '{"subject": 7}'.
    pub key: String,
}

impl JobArgs {
    pub fn key(&self) -> Result<JobKey> {
        parse_key(&self.key)
    }
}

pub fn parse_key(raw: &str) -> Result<JobKey> {
    let value: serde_json::Value =
        serde_json::from_str(raw).with_context(|| format!("key is not valid JSON: {raw}"))?;
    Ok(JobKey::from_json(&value)?)
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Only records of this work unit.
    #[arg(long)]
    pub work_unit: Option<String>,

    /// Only records with this status.
    #[arg(long)]
    pub status: Option<StatusArg>,
}

impl FilterArgs {
    pub fn filter(&self) -> RecordFilter {
        RecordFilter {
            work_unit: self.work_unit.clone(),
            status: self.status.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum StatusArg {
    Reserved,
    Error,
    Ignore,
}

impl From<StatusArg> for JobStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Reserved => JobStatus::Reserved,
            StatusArg::Error => JobStatus::Error,
            StatusArg::Ignore => JobStatus::Ignore,
        }
    }
}

/// What every command needs.
pub struct Context {
    pub config: JobslotConfig,
    pub namespace: String,
    pub format: OutputFormat,
}

impl Context {
    pub fn registry(&self) -> StoreRegistry {
        StoreRegistry::new(Arc::new(Backend::from_config(&self.config)))
    }

    pub async fn store(&self) -> Result<Arc<ReservationStore>> {
        let store = self
            .registry()
            .get(&self.namespace)
            .await
            .with_context(|| format!("opening namespace '{}'", self.namespace))?;
        Ok(store)
    }
}

/// Run the parsed command line.
pub async fn execute(cli: Cli) -> Result<()> {
    let ctx = Context {
        config: cli.config(),
        namespace: cli.namespace.clone(),
        format: cli.format,
    };
    tracing::debug!(backend = %ctx.config.backend, namespace = %ctx.namespace, "executing");

    match cli.command {
        Commands::Reserve(args) => worker::reserve(&ctx, &args).await,
        Commands::Complete(args) => worker::complete(&ctx, &args).await,
        Commands::Error(args) => worker::error(&ctx, &args).await,
        Commands::Race(args) => worker::race(&ctx, &args).await,
        Commands::Status(args) => inspect::status(&ctx, &args).await,
        Commands::List(args) => inspect::list(&ctx, &args).await,
        Commands::Counts => inspect::counts(&ctx).await,
        Commands::Clear(args) => admin::clear(&ctx, &args).await,
        Commands::Ignore(args) => admin::ignore(&ctx, &args).await,
        Commands::Purge(args) => admin::purge(&ctx, &args).await,
        Commands::Drop => admin::drop_table(&ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_key_accepts_objects() {
        let key = parse_key(r#"{"b": "x", "a": 1}"#).unwrap();
        assert_eq!(key, JobKey::new().with("a", 1).with("b", "x"));
    }

    #[test]
    fn parse_key_rejects_garbage() {
        assert!(parse_key("not json").is_err());
        assert!(parse_key(r#"{"a": [1]}"#).is_err());
    }
}
