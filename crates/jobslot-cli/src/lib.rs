//! # jobslot-cli
//!
//! Operator and worker command line for job reservations.
//!
//! ## Commands
//!
//! - `jobslot reserve | complete | error` - the worker protocol, one call at a time
//! - `jobslot status | list | counts` - inspect job records
//! - `jobslot clear | ignore | purge | drop` - operator interventions
//! - `jobslot race` - N concurrent reservers against one medium
//!
//! ## Configuration
//!
//! Flags fall back to environment variables (a `.env` file is loaded first):
//!
//! - `JOBSLOT_BACKEND` - `memory` or `sqlite` (default: `memory`)
//! - `JOBSLOT_SQLITE_DIR` - database directory (default: `./jobslot-data`)
//! - `JOBSLOT_BUSY_TIMEOUT_MS` - SQLite busy timeout (default: `5000`)
//! - `JOBSLOT_NAMESPACE` - namespace (default: `default`)
//!
//! The memory backend lives only as long as one invocation, so it is only
//! meaningful for `race`.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use jobslot_core::{BackendKind, JobslotConfig, SqliteConfig};

/// jobslot - distributed job reservation
#[derive(Debug, Parser)]
#[command(name = "jobslot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Storage backend.
    #[arg(long, env = "JOBSLOT_BACKEND", default_value = "memory")]
    pub backend: BackendArg,

    /// Directory of per-namespace SQLite databases.
    #[arg(long, env = "JOBSLOT_SQLITE_DIR", default_value = "./jobslot-data")]
    pub sqlite_dir: PathBuf,

    /// How long a write waits on a locked database, in milliseconds.
    #[arg(long, env = "JOBSLOT_BUSY_TIMEOUT_MS", default_value_t = 5_000)]
    pub busy_timeout_ms: u64,

    /// Namespace (database / schema name).
    #[arg(long, short = 'n', env = "JOBSLOT_NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Output format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    #[must_use]
    pub fn config(&self) -> JobslotConfig {
        JobslotConfig {
            backend: self.backend.into(),
            sqlite: SqliteConfig {
                dir: self.sqlite_dir.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
            },
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Claim a unit of work. Prints `acquired` or `taken`.
    Reserve(commands::JobArgs),
    /// Report success and release the reservation.
    Complete(commands::JobArgs),
    /// Report failure; the error record keeps blocking the key.
    Error(commands::worker::ErrorArgs),
    /// Show the record of one unit of work.
    Status(commands::JobArgs),
    /// List job records.
    List(commands::FilterArgs),
    /// Count records by status.
    Counts,
    /// Remove a record so the unit of work can be reserved again.
    Clear(commands::JobArgs),
    /// Mark a unit of work as permanently skipped.
    Ignore(commands::JobArgs),
    /// Delete all matching records without confirmation.
    Purge(commands::FilterArgs),
    /// Drop the namespace's job table.
    Drop,
    /// Race N concurrent reservers for one unit of work.
    Race(commands::worker::RaceArgs),
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum BackendArg {
    #[default]
    Memory,
    Sqlite,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Memory => BackendKind::Memory,
            BackendArg::Sqlite => BackendKind::Sqlite,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
}
